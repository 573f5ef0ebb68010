use crate::models::db_operations::{format_timestamp, parse_timestamp};
use crate::models::PostComment;
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, Row};
use uuid::Uuid;

pub struct NewComment<'a> {
    pub post_id: &'a str,
    pub organization_id: Option<&'a str>,
    pub user_id: i64,
    pub author: &'a str,
    pub body: &'a str,
}

fn map_comment(row: &Row) -> rusqlite::Result<PostComment> {
    let created_at: String = row.get(6)?;
    Ok(PostComment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        organization_id: row.get(2)?,
        user_id: row.get(3)?,
        author: row.get(4)?,
        body: row.get(5)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub fn create_comment(conn: &Connection, new: &NewComment) -> Result<PostComment, RusqliteError> {
    let comment = PostComment {
        id: Uuid::new_v4().to_string(),
        post_id: new.post_id.to_string(),
        organization_id: new.organization_id.map(str::to_string),
        user_id: Some(new.user_id),
        author: Some(new.author.to_string()),
        body: new.body.to_string(),
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO post_comments (id, post_id, organization_id, user_id, author, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            comment.id,
            comment.post_id,
            comment.organization_id,
            comment.user_id,
            comment.author,
            comment.body,
            format_timestamp(comment.created_at)
        ],
    )?;
    Ok(comment)
}

/// Newest first.
pub fn list_comments(conn: &Connection, post_id: &str) -> Result<Vec<PostComment>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, organization_id, user_id, author, body, created_at
         FROM post_comments WHERE post_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([post_id], map_comment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_comments_for_post(conn: &Connection, post_id: &str) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM post_comments WHERE post_id = ?1", [post_id])
}
