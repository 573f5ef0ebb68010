use crate::calendar::{
    authorize_transition, offered_transitions, paginate, sort_by_schedule, status_summary, CalendarError,
    CalendarQuery, FilterOptions, PageRequest, PostStatus, StatusFilter, StatusSummary, TransitionRejection,
};
use crate::config::Config;
use crate::helper::csv_import::{self, CsvImportError};
use crate::helper::sanitization_helpers::{clean_optional, sanitize_actor, sanitize_file_name};
use crate::helper::storage_helpers::{calendar_media_path, discard_file, resolve_storage_path, write_field, StorageError};
use crate::models::db_operations::comments_db_operations::{self, NewComment};
use crate::models::db_operations::posts_db_operations::{self, DbError};
use crate::models::{MediaKind, NewPost, PortalUser, Post, PostComment, PostDetailsPatch};
use crate::permissions::{AccessLevel, ModuleKey};
use crate::DbPool;
use actix_multipart::Multipart;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use futures_util::StreamExt;
use redb::Database;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Error, Debug)]
pub enum CalendarHelperError {
    #[error("Database error: {0}")]
    Db(DbError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Import(#[from] CsvImportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Post not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Transition(TransitionRejection),
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Portal(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl From<DbError> for CalendarHelperError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(id) => CalendarHelperError::NotFound(id),
            DbError::Uuid(_) => CalendarHelperError::NotFound("invalid post id".to_string()),
            other => CalendarHelperError::Db(other),
        }
    }
}

/// Query string of `GET /api/posts`. Kept flat so every value arrives as a
/// plain string or number.
#[derive(Debug, Default, Deserialize)]
pub struct PostListParams {
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub status: Option<String>,
    pub channel: Option<String>,
    pub include_archived: Option<bool>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub week: Option<u32>,
    pub topic: Option<String>,
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD`, which covers the whole day.
fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, CalendarHelperError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| CalendarHelperError::Validation(format!("Invalid date '{}'.", raw)))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| CalendarHelperError::Validation(format!("Invalid date '{}'.", raw)))?;
    Ok(Utc.from_utc_datetime(&day.and_time(time)))
}

impl PostListParams {
    pub fn into_query(self, default_size: usize) -> Result<(CalendarQuery, PageRequest), CalendarHelperError> {
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw.parse::<StatusFilter>()?,
            None => StatusFilter::All,
        };
        let from = self.from.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| parse_bound(s, false)).transpose()?;
        let to = self.to.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| parse_bound(s, true)).transpose()?;

        let query = CalendarQuery {
            filter: FilterOptions {
                status,
                channel: self.channel.filter(|c| !c.trim().is_empty()),
                include_archived: self.include_archived.unwrap_or(false),
                from,
                to,
            },
            week: self.week,
            topic: self.topic,
        };
        query.filter.validate()?;
        let page = PageRequest::new(self.page.unwrap_or(0), self.size.unwrap_or(default_size).min(MAX_PAGE_SIZE))?;
        Ok((query, page))
    }
}

#[derive(Debug, Serialize)]
pub struct PostPage {
    pub items: Vec<Post>,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
    pub total_matching: usize,
    pub summary: StatusSummary,
}

pub fn can_see(user: &PortalUser, post: &Post) -> bool {
    user.data_scope()
        .map_or(true, |scope| post.organization_id.as_deref() == Some(scope))
}

fn require_calendar(user: &PortalUser) -> Result<(), CalendarHelperError> {
    if user.can_use(ModuleKey::Calendario) {
        Ok(())
    } else {
        Err(CalendarHelperError::Forbidden("You do not have access to the calendar.".to_string()))
    }
}

fn actor_of(user: &PortalUser) -> String {
    let actor = sanitize_actor(&user.username);
    if actor.is_empty() {
        user.id.to_string()
    } else {
        actor
    }
}

/// Filters then paginates the caller's schedule-ordered posts. The summary
/// counts the matching posts across every status.
pub fn list(db: &Database, user: &PortalUser, query: &CalendarQuery, page: PageRequest) -> Result<PostPage, CalendarHelperError> {
    require_calendar(user)?;
    let mut posts = posts_db_operations::list_posts(db, user.data_scope())?;
    sort_by_schedule(&mut posts);

    let mut any_status = query.clone();
    any_status.filter.status = StatusFilter::All;
    let summary = status_summary(any_status.apply(&posts));

    let matching: Vec<Post> = query.apply(&posts).into_iter().cloned().collect();
    let items = paginate(&matching, page).to_vec();
    let has_more = page.offset() + items.len() < matching.len();
    Ok(PostPage {
        items,
        page: page.page,
        page_size: page.size,
        has_more,
        total_matching: matching.len(),
        summary,
    })
}

pub fn get(db: &Database, user: &PortalUser, post_id: &str) -> Result<Post, CalendarHelperError> {
    require_calendar(user)?;
    let post = posts_db_operations::read_post(db, post_id)?;
    if !can_see(user, &post) {
        return Err(CalendarHelperError::NotFound(post_id.to_string()));
    }
    Ok(post)
}

pub fn transitions(db: &Database, user: &PortalUser, post_id: &str) -> Result<(Post, BTreeSet<PostStatus>), CalendarHelperError> {
    let post = get(db, user, post_id)?;
    let offered = offered_transitions(user.access_level(), post.status);
    Ok((post, offered))
}

fn sanitize_new_post(new_post: NewPost) -> Result<NewPost, CalendarHelperError> {
    let title = clean_optional(Some(&new_post.title))
        .ok_or_else(|| CalendarHelperError::Validation("Title is required.".to_string()))?;
    Ok(NewPost {
        title,
        channel: clean_optional(new_post.channel.as_deref()),
        scheduled_at: new_post.scheduled_at,
        topic: clean_optional(new_post.topic.as_deref()),
        script: clean_optional(new_post.script.as_deref()),
        notes: clean_optional(new_post.notes.as_deref()),
        organization_id: clean_optional(new_post.organization_id.as_deref()),
    })
}

pub fn create(db: &Database, user: &PortalUser, new_post: NewPost) -> Result<Post, CalendarHelperError> {
    if !user.access_level().can_create_posts() {
        return Err(CalendarHelperError::Forbidden("Only admins can create posts.".to_string()));
    }
    let new_post = sanitize_new_post(new_post)?;
    Ok(posts_db_operations::create_post(db, new_post, Some(&actor_of(user)))?)
}

pub fn import(db: &Database, user: &PortalUser, organization_id: Option<&str>, body: &[u8]) -> Result<Vec<Post>, CalendarHelperError> {
    if !user.access_level().can_create_posts() {
        return Err(CalendarHelperError::Forbidden("Only admins can import posts.".to_string()));
    }
    let organization_id = organization_id.map(str::trim).filter(|o| !o.is_empty());
    let new_posts = csv_import::import_csv(body, organization_id, Utc::now())?;
    let created = posts_db_operations::create_posts(db, new_posts, Some(&actor_of(user)))?;
    log::info!("Imported {} posts from CSV for {:?}", created.len(), organization_id);
    Ok(created)
}

/// The role map and the lifecycle are checked inside the write transaction.
pub fn change_status(db: &Database, user: &PortalUser, post_id: &str, raw_status: &str) -> Result<Post, CalendarHelperError> {
    require_calendar(user)?;
    let target: PostStatus = raw_status.trim().parse()?;
    let level = user.access_level();
    let actor = actor_of(user);
    posts_db_operations::modify_post(db, post_id, |post| {
        if !can_see(user, post) {
            return Err(CalendarHelperError::NotFound(post_id.to_string()));
        }
        authorize_transition(level, post.status, target).map_err(|rejection| {
            log::warn!(
                "Rejected transition {} -> {} on post {} for {} ({})",
                post.status,
                target,
                post_id,
                actor,
                level
            );
            CalendarHelperError::Transition(rejection)
        })?;
        post.status = target;
        post.updated_at = Some(Utc::now());
        post.updated_by = Some(actor.clone());
        Ok(())
    })
}

fn apply_text(slot: &mut Option<String>, incoming: Option<String>) {
    if let Some(value) = incoming {
        *slot = clean_optional(Some(&value));
    }
}

pub fn update_details(db: &Database, user: &PortalUser, post_id: &str, patch: PostDetailsPatch) -> Result<Post, CalendarHelperError> {
    if !user.access_level().can_edit_post_details() {
        return Err(CalendarHelperError::Forbidden("You do not have permission to edit this post.".to_string()));
    }
    let title = match patch.title.as_deref() {
        Some(raw) => Some(
            clean_optional(Some(raw)).ok_or_else(|| CalendarHelperError::Validation("Title cannot be empty.".to_string()))?,
        ),
        None => None,
    };
    let actor = actor_of(user);
    posts_db_operations::modify_post(db, post_id, |post| {
        if !can_see(user, post) {
            return Err(CalendarHelperError::NotFound(post_id.to_string()));
        }
        if let Some(title) = title {
            post.title = title;
        }
        apply_text(&mut post.channel, patch.channel);
        apply_text(&mut post.topic, patch.topic);
        apply_text(&mut post.script, patch.script);
        apply_text(&mut post.caption, patch.caption);
        apply_text(&mut post.notes, patch.notes);
        apply_text(&mut post.reference_links, patch.reference_links);
        if let Some(scheduled_at) = patch.scheduled_at {
            post.scheduled_at = scheduled_at;
        }
        post.updated_at = Some(Utc::now());
        post.updated_by = Some(actor.clone());
        Ok(())
    })
}

pub fn toggle_archive(db: &Database, user: &PortalUser, post_id: &str) -> Result<Post, CalendarHelperError> {
    if !user.access_level().can_archive_posts() {
        return Err(CalendarHelperError::Forbidden("You do not have permission to archive this post.".to_string()));
    }
    get(db, user, post_id)?;
    Ok(posts_db_operations::toggle_archive(db, post_id, Some(&actor_of(user)))?)
}

pub fn delete(db: &Database, user: &PortalUser, post_id: &str) -> Result<Post, CalendarHelperError> {
    if !user.access_level().can_delete_posts() {
        return Err(CalendarHelperError::Forbidden("Only admins can delete posts.".to_string()));
    }
    let post = posts_db_operations::delete_post(db, post_id)?;
    log::info!("Post {} deleted by {}", post.id, actor_of(user));
    Ok(post)
}

/// Drops the comments left on a deleted post.
pub fn purge_comments(pool: &DbPool, post_id: &str) -> Result<usize, CalendarHelperError> {
    let conn = pool.get()?;
    Ok(comments_db_operations::delete_comments_for_post(&conn, post_id)?)
}

pub fn list_comments(db: &Database, pool: &DbPool, user: &PortalUser, post_id: &str) -> Result<Vec<PostComment>, CalendarHelperError> {
    let post = get(db, user, post_id)?;
    let conn = pool.get()?;
    Ok(comments_db_operations::list_comments(&conn, &post.id)?)
}

/// Comments inherit the post's organization.
pub fn add_comment(
    db: &Database,
    pool: &DbPool,
    user: &PortalUser,
    post_id: &str,
    body: &str,
) -> Result<PostComment, CalendarHelperError> {
    let post = get(db, user, post_id)?;
    let body = clean_optional(Some(body))
        .ok_or_else(|| CalendarHelperError::Validation("Comment body is required.".to_string()))?;
    let author = actor_of(user);
    let conn = pool.get()?;
    let comment = comments_db_operations::create_comment(
        &conn,
        &NewComment {
            post_id: &post.id,
            organization_id: post.organization_id.as_deref(),
            user_id: user.id,
            author: &author,
            body: &body,
        },
    )?;
    log::debug!("Comment {} added to post {} by {}", comment.id, post.id, author);
    Ok(comment)
}

/// Admins deliver edited cuts, clients deliver raw footage.
pub fn media_kind_for(level: AccessLevel) -> Option<MediaKind> {
    match level {
        AccessLevel::Admin => Some(MediaKind::Edited),
        AccessLevel::Usuario => Some(MediaKind::Raw),
        AccessLevel::Desconhecido => None,
    }
}

/// Stores the uploaded file under the post's folder, records its path and
/// advances the status when the caller may make that move.
pub async fn upload_media(
    db: &Database,
    config: &Config,
    user: &PortalUser,
    post_id: &str,
    mut payload: Multipart,
) -> Result<Post, CalendarHelperError> {
    let level = user.access_level();
    let kind = media_kind_for(level)
        .ok_or_else(|| CalendarHelperError::Forbidden("You do not have permission to upload media.".to_string()))?;
    let post = get(db, user, post_id)?;
    let actor = actor_of(user);

    let mut stored: Option<(String, PathBuf)> = None;
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| StorageError::Multipart(e.to_string()))?;
        let field_name = field.content_disposition().get_name().unwrap_or_default().to_string();
        if field_name != "file" || stored.is_some() {
            continue;
        }
        let file_name = sanitize_file_name(field.content_disposition().get_filename().unwrap_or_default());
        let relative = calendar_media_path(
            post.organization_id.as_deref(),
            Utc::now(),
            &post.id,
            kind.folder(),
            &actor,
            &file_name,
        );
        let target = resolve_storage_path(Path::new(&config.media_path), &relative)?;
        let size = write_field(&mut field, target.clone(), config.portal.max_upload_size_mb).await?;
        log::info!("Stored {} bytes for post {} at {}", size, post.id, relative);
        stored = Some((relative, target));
    }
    let (relative, target) = stored.ok_or_else(|| CalendarHelperError::Validation("No file was uploaded.".to_string()))?;

    record_upload(db, post_id, kind, level, &relative, target, &actor).await
}

/// Removes the stored file again when the post can no longer take it.
async fn record_upload(
    db: &Database,
    post_id: &str,
    kind: MediaKind,
    level: AccessLevel,
    relative: &str,
    stored_at: PathBuf,
    actor: &str,
) -> Result<Post, CalendarHelperError> {
    let recorded = attach_media(db, post_id, kind, level, relative, actor);
    if let Err(e) = &recorded {
        log::warn!("Upload for post {} not recorded ({}), removing {}", post_id, e, relative);
        discard_file(stored_at).await;
    }
    recorded
}

/// Records an uploaded file on the post. The post may have been removed
/// since the upload started, in which case nothing is written.
fn attach_media(
    db: &Database,
    post_id: &str,
    kind: MediaKind,
    level: AccessLevel,
    relative: &str,
    actor: &str,
) -> Result<Post, CalendarHelperError> {
    posts_db_operations::modify_post(db, post_id, |post| {
        match kind {
            MediaKind::Raw => post.raw_video_path = Some(relative.to_string()),
            MediaKind::Edited => post.edited_video_path = Some(relative.to_string()),
        }
        post.media_path = Some(relative.to_string());
        let target = kind.target_status();
        if post.status != target && authorize_transition(level, post.status, target).is_ok() {
            post.status = target;
        }
        post.updated_at = Some(Utc::now());
        post.updated_by = Some(actor.to_string());
        Ok::<(), CalendarHelperError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::posts_db_operations::create_post;
    use crate::models::db_operations::users_db_operations::tests::{add_user, test_pool};
    use crate::permissions::UserRole;
    use crate::setup::db_setup::setup_posts_db;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn open_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("posts.db")).unwrap();
        setup_posts_db(&db).unwrap();
        (dir, db)
    }

    fn portal_user(role: &str, org: Option<&str>) -> PortalUser {
        PortalUser {
            id: 1,
            username: format!("{}_user", role),
            name: None,
            role: role.to_string(),
            organization_id: org.map(str::to_string),
            is_active: true,
            force_password_change: false,
            last_login_time: None,
        }
    }

    fn seed(db: &Database, title: &str, org: &str, day: u32) -> Post {
        create_post(
            db,
            NewPost {
                title: title.to_string(),
                channel: Some("ig".to_string()),
                scheduled_at: Some(Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap()),
                organization_id: Some(org.to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn listing_is_scoped_filtered_then_paginated() {
        let (_dir, db) = open_db();
        for day in 1..=12 {
            seed(&db, &format!("post {day}"), "org-a", day);
        }
        seed(&db, "foreign", "org-b", 1);
        let client = portal_user("client_owner", Some("org-a"));

        let (query, page) = PostListParams::default().into_query(10).unwrap();
        let first = list(&db, &client, &query, page).unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_matching, 12);
        assert!(first.has_more);
        assert_eq!(first.items[0].title, "post 1");
        assert_eq!(first.summary.draft, 12);

        let second = list(&db, &client, &query, page.next()).unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.has_more);

        let admin = portal_user("internal_admin", None);
        assert_eq!(list(&db, &admin, &query, page).unwrap().total_matching, 13);
    }

    #[test]
    fn summary_ignores_the_status_criterion() {
        let (_dir, db) = open_db();
        let a = seed(&db, "a", "org-a", 1);
        seed(&db, "b", "org-a", 2);
        let admin = portal_user("internal_admin", None);
        change_status(&db, &admin, &a.id, "published").unwrap();

        let params = PostListParams { status: Some("published".to_string()), ..Default::default() };
        let (query, page) = params.into_query(10).unwrap();
        let result = list(&db, &admin, &query, page).unwrap();
        assert_eq!(result.total_matching, 1);
        assert_eq!(result.summary.published, 1);
        assert_eq!(result.summary.draft, 1);
    }

    #[test]
    fn list_params_are_validated() {
        let bad_status = PostListParams { status: Some("scheduled".to_string()), ..Default::default() };
        assert!(matches!(bad_status.into_query(10), Err(CalendarHelperError::Calendar(CalendarError::InvalidStatus(_)))));

        let inverted = PostListParams {
            from: Some("2024-06-01".to_string()),
            to: Some("2024-05-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(inverted.into_query(10), Err(CalendarHelperError::Calendar(CalendarError::InvalidWindow { .. }))));

        let zero = PostListParams { size: Some(0), ..Default::default() };
        assert!(matches!(zero.into_query(10), Err(CalendarHelperError::Calendar(CalendarError::InvalidPageSize(0)))));

        let day = PostListParams { to: Some("2024-05-01".to_string()), size: Some(500), ..Default::default() };
        let (query, page) = day.into_query(10).unwrap();
        assert_eq!(query.filter.to, Some(Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap() + chrono::Duration::milliseconds(999)));
        assert_eq!(page.size, MAX_PAGE_SIZE);
    }

    #[test]
    fn status_changes_follow_role_and_lifecycle() {
        let (_dir, db) = open_db();
        let post = seed(&db, "a", "org-a", 1);
        let client = portal_user("client_user", Some("org-a"));
        let admin = portal_user("internal_staff", None);

        assert!(matches!(
            change_status(&db, &client, &post.id, "published"),
            Err(CalendarHelperError::Transition(TransitionRejection::NotOffered))
        ));
        assert!(matches!(
            change_status(&db, &admin, &post.id, "editing"),
            Err(CalendarHelperError::Transition(TransitionRejection::Structural))
        ));
        let moved = change_status(&db, &client, &post.id, "raw_uploaded").unwrap();
        assert_eq!(moved.status, PostStatus::RawUploaded);
        assert_eq!(moved.updated_by.as_deref(), Some("client_user_user"));
        assert!(matches!(
            change_status(&db, &client, &post.id, "bogus"),
            Err(CalendarHelperError::Calendar(CalendarError::InvalidStatus(_)))
        ));
    }

    #[test]
    fn other_organizations_look_missing() {
        let (_dir, db) = open_db();
        let post = seed(&db, "a", "org-a", 1);
        let outsider = portal_user("client_owner", Some("org-b"));
        assert!(matches!(get(&db, &outsider, &post.id), Err(CalendarHelperError::NotFound(_))));
        assert!(matches!(
            change_status(&db, &outsider, &post.id, "raw_uploaded"),
            Err(CalendarHelperError::NotFound(_))
        ));
        assert!(matches!(get(&db, &outsider, "not-a-uuid"), Err(CalendarHelperError::NotFound(_))));
        let unaffected = get(&db, &portal_user("internal_admin", None), &post.id).unwrap();
        assert_eq!(unaffected.status, PostStatus::Draft);
    }

    #[test]
    fn details_are_sanitised_and_reschedule_updates_week() {
        let (_dir, db) = open_db();
        let post = seed(&db, "a", "org-a", 1);
        let client = portal_user("client_owner", Some("org-a"));
        let patch = PostDetailsPatch {
            script: Some("<script>x</script>Fala <b>inicial</b>".to_string()),
            notes: Some("  ".to_string()),
            scheduled_at: Some(Some(Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap())),
            ..Default::default()
        };
        let updated = update_details(&db, &client, &post.id, patch).unwrap();
        assert_eq!(updated.script.as_deref(), Some("Fala inicial"));
        assert_eq!(updated.notes, None);
        assert_eq!(updated.week_number, Some(21));
        assert_eq!(updated.title, "a");

        let unschedule = PostDetailsPatch { scheduled_at: Some(None), ..Default::default() };
        let updated = update_details(&db, &client, &post.id, unschedule).unwrap();
        assert!(updated.scheduled_at.is_none());
        assert!(updated.week_number.is_none());

        let blank_title = PostDetailsPatch { title: Some("<i></i>".to_string()), ..Default::default() };
        assert!(matches!(update_details(&db, &client, &post.id, blank_title), Err(CalendarHelperError::Validation(_))));
    }

    #[test]
    fn create_archive_and_delete_are_gated() {
        let (_dir, db) = open_db();
        let client = portal_user("client_owner", Some("org-a"));
        let admin = portal_user("internal_admin", None);
        let new_post = || NewPost { title: "<b>Lançamento</b>".to_string(), organization_id: Some("org-a".to_string()), ..Default::default() };

        assert!(matches!(create(&db, &client, new_post()), Err(CalendarHelperError::Forbidden(_))));
        let post = create(&db, &admin, new_post()).unwrap();
        assert_eq!(post.title, "Lançamento");
        assert_eq!(post.status, PostStatus::Draft);

        let archived = toggle_archive(&db, &client, &post.id).unwrap();
        assert_eq!(archived.archive_location.as_deref(), Some("manual"));
        assert!(toggle_archive(&db, &client, &post.id).unwrap().archived_at.is_none());

        assert!(matches!(delete(&db, &client, &post.id), Err(CalendarHelperError::Forbidden(_))));
        delete(&db, &admin, &post.id).unwrap();
        assert!(matches!(get(&db, &admin, &post.id), Err(CalendarHelperError::NotFound(_))));
    }

    #[test]
    fn csv_import_is_admin_only() {
        let (_dir, db) = open_db();
        let csv = b"Data,Canal,Tema\n10/05,ig,Bastidores\n11/05,li,Cases\n";
        let client = portal_user("client_owner", Some("org-a"));
        assert!(matches!(import(&db, &client, Some("org-a"), csv), Err(CalendarHelperError::Forbidden(_))));

        let admin = portal_user("internal_admin", None);
        let created = import(&db, &admin, Some("org-a"), csv).unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|p| p.status == PostStatus::Draft && p.organization_id.as_deref() == Some("org-a")));
        assert!(matches!(import(&db, &admin, None, b""), Err(CalendarHelperError::Import(CsvImportError::Empty))));
    }

    #[test]
    fn unknown_roles_are_denied_the_calendar() {
        let (_dir, db) = open_db();
        let post = seed(&db, "a", "org-a", 1);
        let stranger = portal_user("freelancer", Some("org-a"));
        let (query, page) = PostListParams::default().into_query(10).unwrap();

        assert!(matches!(list(&db, &stranger, &query, page), Err(CalendarHelperError::Forbidden(_))));
        assert!(matches!(get(&db, &stranger, &post.id), Err(CalendarHelperError::Forbidden(_))));
        assert!(matches!(transitions(&db, &stranger, &post.id), Err(CalendarHelperError::Forbidden(_))));
        assert!(matches!(
            change_status(&db, &stranger, &post.id, "raw_uploaded"),
            Err(CalendarHelperError::Forbidden(_))
        ));
        assert_eq!(get(&db, &portal_user("internal_admin", None), &post.id).unwrap().status, PostStatus::Draft);
    }

    #[actix_web::test]
    async fn upload_is_recorded_or_removed() {
        let (dir, db) = open_db();
        let post = seed(&db, "a", "org-a", 1);
        let relative = "org/org-a/2024/5/calendar/p/raw-ana-clip.mp4";

        let kept = dir.path().join("kept.mp4");
        std::fs::write(&kept, b"clip").unwrap();
        let updated = record_upload(&db, &post.id, MediaKind::Raw, AccessLevel::Usuario, relative, kept.clone(), "ana")
            .await
            .unwrap();
        assert_eq!(updated.raw_video_path.as_deref(), Some(relative));
        assert_eq!(updated.status, PostStatus::RawUploaded);
        assert!(kept.exists());

        delete(&db, &portal_user("internal_admin", None), &post.id).unwrap();
        let orphan = dir.path().join("orphan.mp4");
        std::fs::write(&orphan, b"clip").unwrap();
        let result = record_upload(&db, &post.id, MediaKind::Raw, AccessLevel::Usuario, relative, orphan.clone(), "ana").await;
        assert!(matches!(result, Err(CalendarHelperError::NotFound(_))));
        assert!(!orphan.exists());
    }

    #[test]
    fn comments_follow_post_visibility() {
        let (_dir, db) = open_db();
        let pool = test_pool();
        let ana_id = add_user(&pool.get().unwrap(), "ana", UserRole::ClientOwner, Some("org-a"));
        let ana = PortalUser { id: ana_id, username: "ana".to_string(), ..portal_user("client_owner", Some("org-a")) };
        let rival = portal_user("client_owner", Some("org-b"));
        let post = seed(&db, "a", "org-a", 1);

        let first = add_comment(&db, &pool, &ana, &post.id, "  <b>Pode</b> publicar ").unwrap();
        assert_eq!(first.body, "Pode publicar");
        assert_eq!(first.organization_id.as_deref(), Some("org-a"));
        assert_eq!(first.author.as_deref(), Some("ana"));
        add_comment(&db, &pool, &ana, &post.id, "segundo").unwrap();
        assert!(matches!(add_comment(&db, &pool, &ana, &post.id, "<i></i>"), Err(CalendarHelperError::Validation(_))));

        let listed = list_comments(&db, &pool, &ana, &post.id).unwrap();
        assert_eq!(listed.iter().map(|c| c.body.as_str()).collect::<Vec<_>>(), vec!["segundo", "Pode publicar"]);
        assert!(matches!(list_comments(&db, &pool, &rival, &post.id), Err(CalendarHelperError::NotFound(_))));
        assert!(matches!(add_comment(&db, &pool, &rival, &post.id, "oi"), Err(CalendarHelperError::NotFound(_))));

        assert_eq!(purge_comments(&pool, &post.id).unwrap(), 2);
        assert!(list_comments(&db, &pool, &ana, &post.id).unwrap().is_empty());
    }

    #[test]
    fn uploads_land_in_role_folders() {
        assert_eq!(media_kind_for(AccessLevel::Usuario), Some(MediaKind::Raw));
        assert_eq!(media_kind_for(AccessLevel::Admin), Some(MediaKind::Edited));
        assert_eq!(media_kind_for(AccessLevel::Desconhecido), None);
    }
}
