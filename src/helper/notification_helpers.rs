use crate::helper::sanitization_helpers::clean_optional;
use crate::models::db_operations::notifications_db_operations;
use crate::models::{NewNotification, Notification, PortalUser};
use crate::permissions::ModuleKey;
use crate::DbPool;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Notification not found: {0}")]
    NotFound(String),
    #[error("You do not have permission to manage notifications.")]
    Forbidden,
    #[error("You do not have access to notifications.")]
    NoAccess,
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    #[default]
    All,
    Unread,
}

#[derive(Debug, Clone, Copy)]
struct CachedReceipt {
    read_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
}

/// Last-write-wins read receipts keyed by `(user id, notification id)`.
///
/// Entries older than the TTL are dropped on access, after which the
/// stored receipts are authoritative again.
#[derive(Debug)]
pub struct ReceiptCache {
    entries: HashMap<(i64, String), CachedReceipt>,
    ttl: Duration,
}

impl ReceiptCache {
    pub fn new(ttl: Duration) -> Self {
        ReceiptCache { entries: HashMap::new(), ttl }
    }

    /// Keeps the later of the cached and the incoming `read_at`.
    pub fn record(&mut self, user_id: i64, notification_id: &str, read_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.purge_expired(now);
        let entry = self
            .entries
            .entry((user_id, notification_id.to_string()))
            .or_insert(CachedReceipt { read_at, recorded_at: now });
        if read_at > entry.read_at {
            entry.read_at = read_at;
        }
        entry.recorded_at = now;
    }

    pub fn get(&mut self, user_id: i64, notification_id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.purge_expired(now);
        self.entries
            .get(&(user_id, notification_id.to_string()))
            .map(|receipt| receipt.read_at)
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, receipt| now - receipt.recorded_at < ttl);
        before - self.entries.len()
    }

    /// Overlays cached receipts on rows loaded from the store.
    pub fn merge(&mut self, user_id: i64, notifications: &mut [Notification], now: DateTime<Utc>) {
        self.purge_expired(now);
        for notification in notifications.iter_mut() {
            let cached = self
                .entries
                .get(&(user_id, notification.id.clone()))
                .map(|receipt| receipt.read_at);
            notification.read_at = match (notification.read_at, cached) {
                (Some(stored), Some(cached)) => Some(stored.max(cached)),
                (stored, cached) => stored.or(cached),
            };
        }
    }

    pub fn forget_notification(&mut self, notification_id: &str) {
        self.entries.retain(|(_, id), _| id != notification_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn require_notices(user: &PortalUser) -> Result<(), NotificationError> {
    if user.can_use(ModuleKey::Avisos) {
        Ok(())
    } else {
        Err(NotificationError::NoAccess)
    }
}

fn lock_cache(cache: &RwLock<ReceiptCache>) -> RwLockWriteGuard<'_, ReceiptCache> {
    cache.write().unwrap_or_else(|poisoned| {
        log::error!("RwLock for the receipt cache was poisoned! Using stale data.");
        poisoned.into_inner()
    })
}

pub fn list_for_user(
    pool: &DbPool,
    cache: &RwLock<ReceiptCache>,
    user: &PortalUser,
    mode: ListMode,
) -> Result<Vec<Notification>, NotificationError> {
    require_notices(user)?;
    let conn = pool.get()?;
    let mut notifications = notifications_db_operations::list_notifications(&conn, user.id, user.data_scope())?;
    lock_cache(cache).merge(user.id, &mut notifications, Utc::now());
    if mode == ListMode::Unread {
        notifications.retain(|n| n.read_at.is_none());
    }
    Ok(notifications)
}

fn is_visible(user: &PortalUser, notification: &Notification) -> bool {
    match (user.data_scope(), notification.organization_id.as_deref()) {
        (None, _) | (_, None) => true,
        (Some(scope), Some(org)) => scope == org,
    }
}

/// Records the receipt in the cache first, then in the store. A failed
/// store write is returned while the cached receipt stays until it expires.
pub fn mark_read(
    pool: &DbPool,
    cache: &RwLock<ReceiptCache>,
    user: &PortalUser,
    notification_id: &str,
) -> Result<DateTime<Utc>, NotificationError> {
    require_notices(user)?;
    let conn = pool.get()?;
    let notification = notifications_db_operations::read_notification(&conn, notification_id)?
        .filter(|n| is_visible(user, n))
        .ok_or_else(|| NotificationError::NotFound(notification_id.to_string()))?;

    let now = Utc::now();
    lock_cache(cache).record(user.id, &notification.id, now, now);
    notifications_db_operations::mark_read(&conn, &notification.id, user.id, now)?;
    Ok(now)
}

pub fn mark_all_read(
    pool: &DbPool,
    cache: &RwLock<ReceiptCache>,
    user: &PortalUser,
) -> Result<usize, NotificationError> {
    require_notices(user)?;
    let conn = pool.get()?;
    let visible = notifications_db_operations::list_notifications(&conn, user.id, user.data_scope())?;
    let now = Utc::now();
    {
        let mut cache = lock_cache(cache);
        for notification in &visible {
            cache.record(user.id, &notification.id, now, now);
        }
    }
    Ok(notifications_db_operations::mark_all_read(&conn, user.id, user.data_scope(), now)?)
}

pub fn create(pool: &DbPool, user: &PortalUser, new: NewNotification) -> Result<Notification, NotificationError> {
    if !user.access_level().can_manage_notifications() {
        return Err(NotificationError::Forbidden);
    }
    let title = clean_optional(Some(&new.title))
        .ok_or_else(|| NotificationError::Validation("Title is required.".to_string()))?;
    let r#type = clean_optional(Some(&new.r#type)).unwrap_or_else(|| "info".to_string());
    let sanitized = NewNotification {
        r#type,
        title,
        body: clean_optional(new.body.as_deref()),
        origin: clean_optional(new.origin.as_deref()),
        organization_id: clean_optional(new.organization_id.as_deref()),
    };
    let conn = pool.get()?;
    Ok(notifications_db_operations::create_notification(&conn, &sanitized)?)
}

/// Emits a system notification, e.g. `task_completed`, for an organization.
pub fn emit(
    pool: &DbPool,
    r#type: &str,
    title: &str,
    body: Option<String>,
    organization_id: Option<&str>,
) -> Result<Notification, NotificationError> {
    let conn = pool.get()?;
    let new = NewNotification {
        r#type: r#type.to_string(),
        title: title.to_string(),
        body,
        origin: Some("system".to_string()),
        organization_id: organization_id.map(str::to_string),
    };
    Ok(notifications_db_operations::create_notification(&conn, &new)?)
}

pub fn delete(
    pool: &DbPool,
    cache: &RwLock<ReceiptCache>,
    user: &PortalUser,
    notification_id: &str,
) -> Result<(), NotificationError> {
    if !user.access_level().can_manage_notifications() {
        return Err(NotificationError::Forbidden);
    }
    let conn = pool.get()?;
    if notifications_db_operations::delete_notification(&conn, notification_id)? == 0 {
        return Err(NotificationError::NotFound(notification_id.to_string()));
    }
    lock_cache(cache).forget_notification(notification_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::users_db_operations::{read_user_by_id, tests::{add_user, test_pool}};
    use crate::permissions::UserRole;

    fn user(pool: &DbPool, username: &str, role: UserRole, org: Option<&str>) -> PortalUser {
        let conn = pool.get().unwrap();
        let id = add_user(&conn, username, role, org);
        read_user_by_id(&conn, id).unwrap().unwrap()
    }

    fn announce(pool: &DbPool, admin: &PortalUser, title: &str, org: Option<&str>) -> Notification {
        create(
            pool,
            admin,
            NewNotification {
                r#type: "info".to_string(),
                title: title.to_string(),
                body: None,
                origin: None,
                organization_id: org.map(str::to_string),
            },
        )
        .unwrap()
    }

    #[test]
    fn later_read_wins_in_cache() {
        let mut cache = ReceiptCache::new(Duration::hours(1));
        let now = Utc::now();
        cache.record(1, "n1", now, now);
        cache.record(1, "n1", now - Duration::minutes(10), now);
        assert_eq!(cache.get(1, "n1", now), Some(now));
        cache.record(1, "n1", now + Duration::minutes(1), now);
        assert_eq!(cache.get(1, "n1", now), Some(now + Duration::minutes(1)));
        assert_eq!(cache.get(2, "n1", now), None);
    }

    #[test]
    fn stale_entries_are_purged_on_access() {
        let mut cache = ReceiptCache::new(Duration::minutes(5));
        let now = Utc::now();
        cache.record(1, "n1", now, now);
        cache.record(1, "n2", now, now + Duration::minutes(3));
        assert_eq!(cache.get(1, "n1", now + Duration::minutes(6)), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(now + Duration::hours(1)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn merge_prefers_latest_receipt() {
        let now = Utc::now();
        let mut cache = ReceiptCache::new(Duration::hours(1));
        cache.record(7, "a", now, now);
        let base = Notification {
            id: "a".to_string(),
            r#type: "info".to_string(),
            title: "t".to_string(),
            body: None,
            origin: None,
            organization_id: None,
            created_at: now,
            read_at: None,
        };
        let mut rows = vec![
            base.clone(),
            Notification { id: "b".to_string(), ..base.clone() },
            Notification { read_at: Some(now + Duration::minutes(2)), ..base },
        ];
        cache.merge(7, &mut rows, now);
        assert_eq!(rows[0].read_at, Some(now));
        assert_eq!(rows[1].read_at, None);
        assert_eq!(rows[2].read_at, Some(now + Duration::minutes(2)));
    }

    #[test]
    fn unread_mode_hides_read_items() {
        let pool = test_pool();
        let cache = RwLock::new(ReceiptCache::new(Duration::hours(1)));
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let client = user(&pool, "ana", UserRole::ClientOwner, Some("org-a"));
        let first = announce(&pool, &admin, "first", Some("org-a"));
        announce(&pool, &admin, "second", None);
        announce(&pool, &admin, "other org", Some("org-b"));

        mark_read(&pool, &cache, &client, &first.id).unwrap();
        let unread = list_for_user(&pool, &cache, &client, ListMode::Unread).unwrap();
        let titles: Vec<&str> = unread.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["second"]);
        assert_eq!(list_for_user(&pool, &cache, &client, ListMode::All).unwrap().len(), 2);
        assert_eq!(list_for_user(&pool, &cache, &admin, ListMode::All).unwrap().len(), 3);
    }

    #[test]
    fn other_organizations_cannot_be_marked() {
        let pool = test_pool();
        let cache = RwLock::new(ReceiptCache::new(Duration::hours(1)));
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let client = user(&pool, "ana", UserRole::ClientUser, Some("org-a"));
        let foreign = announce(&pool, &admin, "other org", Some("org-b"));
        assert!(matches!(
            mark_read(&pool, &cache, &client, &foreign.id),
            Err(NotificationError::NotFound(_))
        ));
        assert!(lock_cache(&cache).is_empty());
    }

    #[test]
    fn read_all_then_delete_clears_cache() {
        let pool = test_pool();
        let cache = RwLock::new(ReceiptCache::new(Duration::hours(1)));
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let client = user(&pool, "ana", UserRole::ClientOwner, Some("org-a"));
        let n = announce(&pool, &admin, "first", Some("org-a"));
        announce(&pool, &admin, "second", None);

        assert_eq!(mark_all_read(&pool, &cache, &client).unwrap(), 2);
        assert!(list_for_user(&pool, &cache, &client, ListMode::Unread).unwrap().is_empty());

        assert!(matches!(delete(&pool, &cache, &client, &n.id), Err(NotificationError::Forbidden)));
        delete(&pool, &cache, &admin, &n.id).unwrap();
        assert_eq!(lock_cache(&cache).len(), 1);
        assert!(matches!(delete(&pool, &cache, &admin, &n.id), Err(NotificationError::NotFound(_))));
    }

    #[test]
    fn unknown_roles_see_no_notifications() {
        let pool = test_pool();
        let cache = RwLock::new(ReceiptCache::new(Duration::hours(1)));
        let admin = user(&pool, "root", UserRole::InternalAdmin, None);
        let n = announce(&pool, &admin, "first", Some("org-a"));
        let stranger = PortalUser { role: "freelancer".to_string(), organization_id: Some("org-a".to_string()), ..admin.clone() };

        assert!(matches!(list_for_user(&pool, &cache, &stranger, ListMode::All), Err(NotificationError::NoAccess)));
        assert!(matches!(mark_read(&pool, &cache, &stranger, &n.id), Err(NotificationError::NoAccess)));
        assert!(matches!(mark_all_read(&pool, &cache, &stranger), Err(NotificationError::NoAccess)));
        assert!(lock_cache(&cache).is_empty());
    }

    #[test]
    fn creation_requires_admin_and_title() {
        let pool = test_pool();
        let admin = user(&pool, "root", UserRole::InternalStaff, None);
        let client = user(&pool, "ana", UserRole::ClientOwner, Some("org-a"));
        let blank = NewNotification {
            r#type: String::new(),
            title: "<b> </b>".to_string(),
            body: None,
            origin: None,
            organization_id: None,
        };
        assert!(matches!(create(&pool, &client, blank.clone()), Err(NotificationError::Forbidden)));
        assert!(matches!(create(&pool, &admin, blank), Err(NotificationError::Validation(_))));
    }
}
