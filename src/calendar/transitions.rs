use crate::calendar::CalendarError;
use crate::permissions::AccessLevel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a post. Declaration order is the editorial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    RawUploaded,
    Editing,
    Approved,
    Published,
}

impl PostStatus {
    pub const ALL: [PostStatus; 5] = [
        PostStatus::Draft,
        PostStatus::RawUploaded,
        PostStatus::Editing,
        PostStatus::Approved,
        PostStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::RawUploaded => "raw_uploaded",
            PostStatus::Editing => "editing",
            PostStatus::Approved => "approved",
            PostStatus::Published => "published",
        }
    }
}

impl FromStr for PostStatus {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "raw_uploaded" => Ok(PostStatus::RawUploaded),
            "editing" => Ok(PostStatus::Editing),
            "approved" => Ok(PostStatus::Approved),
            "published" => Ok(PostStatus::Published),
            other => Err(CalendarError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural legality of a status change, independent of who asks.
///
/// `draft` may jump straight to any later state while `raw_uploaded`
/// cannot skip to `published`. Every non-draft state may revert to `draft`.
pub fn can_transition(from: PostStatus, to: PostStatus) -> bool {
    use PostStatus::*;
    if from == to {
        return false;
    }
    match (from, to) {
        (Draft, RawUploaded | Approved | Published) => true,
        (RawUploaded, Editing | Approved) => true,
        (Editing, Approved | Published) => true,
        (Approved, Published) => true,
        (RawUploaded | Editing | Approved | Published, Draft) => true,
        _ => false,
    }
}

pub type TransitionMap = BTreeMap<PostStatus, BTreeSet<PostStatus>>;

/// Transitions a UI may offer to an access level, keyed by current status.
/// Every status is present as a key; `desconhecido` gets empty sets.
pub fn allowed_transitions_by_role(level: AccessLevel) -> TransitionMap {
    use PostStatus::*;
    let table: [(PostStatus, &[PostStatus]); 5] = match level {
        AccessLevel::Admin => [
            (Draft, &[RawUploaded, Editing, Approved, Published]),
            (RawUploaded, &[Editing, Approved, Draft]),
            (Editing, &[Approved, Published, Draft]),
            (Approved, &[Published, Draft]),
            (Published, &[Draft]),
        ],
        AccessLevel::Usuario => [
            (Draft, &[RawUploaded, Approved]),
            (RawUploaded, &[Approved, Draft]),
            (Editing, &[Draft]),
            (Approved, &[Draft]),
            (Published, &[Draft]),
        ],
        AccessLevel::Desconhecido => [
            (Draft, &[]),
            (RawUploaded, &[]),
            (Editing, &[]),
            (Approved, &[]),
            (Published, &[]),
        ],
    };

    table
        .iter()
        .map(|(from, targets)| (*from, targets.iter().copied().collect()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    /// The role map does not offer this change to the caller.
    NotOffered,
    /// The lifecycle graph has no such edge.
    Structural,
}

impl fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionRejection::NotOffered => f.write_str("transition not permitted for this access level"),
            TransitionRejection::Structural => f.write_str("transition not allowed by the post lifecycle"),
        }
    }
}

/// Both gates must pass: the role map and the structural check.
pub fn authorize_transition(
    level: AccessLevel,
    from: PostStatus,
    to: PostStatus,
) -> Result<(), TransitionRejection> {
    let offered = allowed_transitions_by_role(level)
        .get(&from)
        .map_or(false, |targets| targets.contains(&to));
    if !offered {
        return Err(TransitionRejection::NotOffered);
    }
    if !can_transition(from, to) {
        return Err(TransitionRejection::Structural);
    }
    Ok(())
}

/// The targets an access level can actually move a post to from `from`.
pub fn offered_transitions(level: AccessLevel, from: PostStatus) -> BTreeSet<PostStatus> {
    allowed_transitions_by_role(level)
        .remove(&from)
        .unwrap_or_default()
        .into_iter()
        .filter(|to| can_transition(from, *to))
        .collect()
}
