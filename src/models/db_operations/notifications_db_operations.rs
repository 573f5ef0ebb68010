use crate::models::db_operations::{format_timestamp, parse_timestamp};
use crate::models::{NewNotification, Notification};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};
use uuid::Uuid;

fn map_notification(row: &Row) -> rusqlite::Result<Notification> {
    let created_at: String = row.get(6)?;
    let read_at: Option<String> = row.get(7)?;
    Ok(Notification {
        id: row.get(0)?,
        r#type: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        origin: row.get(4)?,
        organization_id: row.get(5)?,
        created_at: parse_timestamp(&created_at)?,
        read_at: read_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

pub fn create_notification(conn: &Connection, new: &NewNotification) -> Result<Notification, RusqliteError> {
    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        r#type: new.r#type.clone(),
        title: new.title.clone(),
        body: new.body.clone(),
        origin: new.origin.clone(),
        organization_id: new.organization_id.clone(),
        created_at: Utc::now(),
        read_at: None,
    };
    conn.execute(
        "INSERT INTO notifications (id, type, title, body, origin, organization_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notification.id,
            notification.r#type,
            notification.title,
            notification.body,
            notification.origin,
            notification.organization_id,
            format_timestamp(notification.created_at)
        ],
    )?;
    Ok(notification)
}

/// Newest first, with the stored receipt of `user_id` merged in.
///
/// `organization` of `None` lists every row; otherwise org-wide rows
/// (no organization) plus the rows of that organization.
pub fn list_notifications(
    conn: &Connection,
    user_id: i64,
    organization: Option<&str>,
) -> Result<Vec<Notification>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT n.id, n.type, n.title, n.body, n.origin, n.organization_id, n.created_at, r.read_at
         FROM notifications n
         LEFT JOIN notification_reads r ON r.notification_id = n.id AND r.user_id = ?1
         WHERE ?2 IS NULL OR n.organization_id IS NULL OR n.organization_id = ?2
         ORDER BY n.created_at DESC, n.id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id, organization], map_notification)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn read_notification(conn: &Connection, notification_id: &str) -> Result<Option<Notification>, RusqliteError> {
    conn.query_row(
        "SELECT id, type, title, body, origin, organization_id, created_at, NULL FROM notifications WHERE id = ?1",
        [notification_id],
        map_notification,
    )
    .optional()
}

/// Upserts a receipt. A stored receipt is only replaced by a later `read_at`.
pub fn mark_read(
    conn: &Connection,
    notification_id: &str,
    user_id: i64,
    read_at: DateTime<Utc>,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "INSERT INTO notification_reads (notification_id, user_id, read_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (notification_id, user_id) DO UPDATE SET
             read_at = CASE WHEN excluded.read_at > read_at THEN excluded.read_at ELSE read_at END",
        params![notification_id, user_id, format_timestamp(read_at)],
    )
}

/// Marks every notification visible in `organization` as read by `user_id`.
pub fn mark_all_read(
    conn: &Connection,
    user_id: i64,
    organization: Option<&str>,
    read_at: DateTime<Utc>,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "INSERT INTO notification_reads (notification_id, user_id, read_at)
         SELECT n.id, ?1, ?3 FROM notifications n
         WHERE ?2 IS NULL OR n.organization_id IS NULL OR n.organization_id = ?2
         ON CONFLICT (notification_id, user_id) DO UPDATE SET
             read_at = CASE WHEN excluded.read_at > read_at THEN excluded.read_at ELSE read_at END",
        params![user_id, organization, format_timestamp(read_at)],
    )
}

pub fn delete_notification(conn: &Connection, notification_id: &str) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM notifications WHERE id = ?1", [notification_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::users_db_operations::tests::{add_user, portal_conn};
    use crate::permissions::UserRole;
    use chrono::Duration;

    fn notify(conn: &Connection, title: &str, org: Option<&str>) -> Notification {
        let n = create_notification(
            conn,
            &NewNotification {
                r#type: "info".to_string(),
                title: title.to_string(),
                body: None,
                origin: None,
                organization_id: org.map(str::to_string),
            },
        )
        .unwrap();
        // Spread creation times so ordering does not depend on clock resolution.
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))
            .unwrap();
        let created_at = Utc::now() - Duration::hours(24) + Duration::minutes(count);
        conn.execute(
            "UPDATE notifications SET created_at = ?1 WHERE id = ?2",
            params![format_timestamp(created_at), n.id],
        )
        .unwrap();
        n
    }

    #[test]
    fn listing_is_org_scoped_and_newest_first() {
        let conn = portal_conn();
        let user = add_user(&conn, "ana", UserRole::ClientOwner, Some("org-a"));
        notify(&conn, "everyone", None);
        notify(&conn, "mine", Some("org-a"));
        notify(&conn, "theirs", Some("org-b"));

        let titles: Vec<String> = list_notifications(&conn, user, Some("org-a"))
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["mine", "everyone"]);
        assert_eq!(list_notifications(&conn, user, None).unwrap().len(), 3);
    }

    #[test]
    fn later_receipt_wins() {
        let conn = portal_conn();
        let user = add_user(&conn, "ana", UserRole::ClientOwner, Some("org-a"));
        let n = notify(&conn, "mine", Some("org-a"));
        let first = Utc::now();
        mark_read(&conn, &n.id, user, first).unwrap();
        mark_read(&conn, &n.id, user, first - Duration::minutes(5)).unwrap();

        let listed = list_notifications(&conn, user, Some("org-a")).unwrap();
        assert_eq!(
            format_timestamp(listed[0].read_at.unwrap()),
            format_timestamp(first)
        );
    }

    #[test]
    fn read_all_only_touches_visible_rows() {
        let conn = portal_conn();
        let user = add_user(&conn, "ana", UserRole::ClientOwner, Some("org-a"));
        notify(&conn, "everyone", None);
        notify(&conn, "mine", Some("org-a"));
        notify(&conn, "theirs", Some("org-b"));
        assert_eq!(mark_all_read(&conn, user, Some("org-a"), Utc::now()).unwrap(), 2);

        let all = list_notifications(&conn, user, None).unwrap();
        let unread: Vec<&str> = all.iter().filter(|n| n.read_at.is_none()).map(|n| n.title.as_str()).collect();
        assert_eq!(unread, vec!["theirs"]);
    }

    #[test]
    fn deleting_cascades_receipts() {
        let conn = portal_conn();
        let user = add_user(&conn, "ana", UserRole::ClientOwner, Some("org-a"));
        let n = notify(&conn, "mine", Some("org-a"));
        mark_read(&conn, &n.id, user, Utc::now()).unwrap();
        assert_eq!(delete_notification(&conn, &n.id).unwrap(), 1);
        let receipts: i64 = conn
            .query_row("SELECT COUNT(*) FROM notification_reads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(receipts, 0);
        assert!(read_notification(&conn, &n.id).unwrap().is_none());
    }
}
