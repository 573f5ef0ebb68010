use crate::calendar::PostStatus;
use crate::onboarding::TaskStatus;
use crate::permissions::{can_access_module, AccessLevel, ModuleKey, UserRole};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub organization_id: Option<String>,
    pub title: String,
    pub channel: Option<String>,
    pub status: PostStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub media_path: Option<String>,
    pub caption: Option<String>,
    pub topic: Option<String>,
    pub script: Option<String>,
    pub raw_video_path: Option<String>,
    pub edited_video_path: Option<String>,
    pub notes: Option<String>,
    pub week_number: Option<u32>,
    pub weekday: Option<u32>,
    pub reference_links: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub archive_location: Option<String>,
}

impl Post {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Recomputes `week_number` (ISO week) and `weekday` (0 = Sunday).
    pub fn refresh_schedule_metadata(&mut self) {
        match self.scheduled_at {
            Some(at) => {
                self.week_number = Some(at.iso_week().week());
                self.weekday = Some(at.weekday().num_days_from_sunday());
            }
            None => {
                self.week_number = None;
                self.weekday = None;
            }
        }
    }
}

/// Fields accepted when a post is created. Status always starts at draft.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub channel: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub topic: Option<String>,
    pub script: Option<String>,
    pub notes: Option<String>,
    pub organization_id: Option<String>,
}

/// Editable post fields. `None` leaves the field untouched.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PostDetailsPatch {
    pub title: Option<String>,
    pub channel: Option<String>,
    pub topic: Option<String>,
    pub script: Option<String>,
    pub caption: Option<String>,
    pub notes: Option<String>,
    pub reference_links: Option<String>,
    /// Absent keeps the schedule, `null` clears it.
    #[serde(default, deserialize_with = "deserialize_present")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Raw,
    Edited,
}

impl MediaKind {
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Raw => "raw",
            MediaKind::Edited => "edited",
        }
    }

    /// The status an upload of this kind moves the post towards.
    pub fn target_status(&self) -> PostStatus {
        match self {
            MediaKind::Raw => PostStatus::RawUploaded,
            MediaKind::Edited => PostStatus::Approved,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct PortalUser {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub role: String,
    pub organization_id: Option<String>,
    pub is_active: bool,
    pub force_password_change: bool,
    pub last_login_time: Option<String>,
}

impl PortalUser {
    pub fn user_role(&self) -> Option<UserRole> {
        UserRole::parse_lenient(Some(&self.role))
    }

    pub fn access_level(&self) -> AccessLevel {
        AccessLevel::from_role(self.user_role())
    }

    /// Unknown roles can use no module.
    pub fn can_use(&self, module: ModuleKey) -> bool {
        can_access_module(module, self.user_role())
    }

    /// Organization filter for the caller's reads. `None` means every
    /// organization (admins); clients without an organization get `""`,
    /// which matches only rows that belong to no organization.
    pub fn data_scope(&self) -> Option<&str> {
        match self.access_level() {
            AccessLevel::Admin => None,
            _ => Some(self.organization_id.as_deref().unwrap_or("")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub r#type: String,
    pub title: String,
    pub body: Option<String>,
    pub origin: Option<String>,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewNotification {
    pub r#type: String,
    pub title: String,
    pub body: Option<String>,
    pub origin: Option<String>,
    pub organization_id: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OnboardingStep {
    pub id: String,
    pub title: String,
    pub position: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OnboardingTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<String>,
    pub step_id: String,
    pub organization_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OnboardingTemplate {
    pub name: String,
    pub steps: Vec<TemplateStep>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemplateStep {
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<TemplateTask>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemplateTask {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ClientInvite {
    pub id: i64,
    pub target_username: String,
    pub target_role: String,
    pub organization_id: String,
    pub target_user_id: Option<i64>,
    pub status: String,
    pub result: String,
    pub created_by: i64,
    pub created_at: String,
}

pub mod db_operations;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PostComment {
    pub id: String,
    pub post_id: String,
    pub organization_id: Option<String>,
    pub user_id: Option<i64>,
    pub author: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Term {
    pub id: String,
    pub title: String,
    pub body: String,
    pub version: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewTerm {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct TermSignature {
    pub id: String,
    pub term_id: String,
    pub organization_id: String,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub signed_at: DateTime<Utc>,
}
