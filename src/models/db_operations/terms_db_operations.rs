use crate::models::db_operations::{format_timestamp, parse_timestamp};
use crate::models::{Term, TermSignature};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};
use uuid::Uuid;

pub struct SignatureRecord<'a> {
    pub term_id: &'a str,
    pub organization_id: &'a str,
    pub user_id: i64,
    pub user_name: Option<&'a str>,
    pub ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

fn map_term(row: &Row) -> rusqlite::Result<Term> {
    let created_at: String = row.get(5)?;
    Ok(Term {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        version: row.get(3)?,
        is_active: row.get(4)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn map_signature(row: &Row) -> rusqlite::Result<TermSignature> {
    let signed_at: String = row.get(7)?;
    Ok(TermSignature {
        id: row.get(0)?,
        term_id: row.get(1)?,
        organization_id: row.get(2)?,
        user_id: row.get(3)?,
        user_name: row.get(4)?,
        ip: row.get(5)?,
        user_agent: row.get(6)?,
        signed_at: parse_timestamp(&signed_at)?,
    })
}

/// Stores a new active term one version above the current highest.
pub fn create_term(conn: &mut Connection, title: &str, body: &str) -> Result<Term, RusqliteError> {
    let tx = conn.transaction()?;
    let version: i64 = tx.query_row("SELECT COALESCE(MAX(version), 0) + 1 FROM terms", [], |row| row.get(0))?;
    let term = Term {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        body: body.to_string(),
        version,
        is_active: true,
        created_at: Utc::now(),
    };
    tx.execute(
        "INSERT INTO terms (id, title, body, version, is_active, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![term.id, term.title, term.body, term.version, format_timestamp(term.created_at)],
    )?;
    tx.commit()?;
    Ok(term)
}

pub fn set_term_active(conn: &Connection, term_id: &str, active: bool) -> Result<usize, RusqliteError> {
    conn.execute("UPDATE terms SET is_active = ?1 WHERE id = ?2", params![active, term_id])
}

/// The highest active version, if any term is active.
pub fn read_active_term(conn: &Connection) -> Result<Option<Term>, RusqliteError> {
    conn.query_row(
        "SELECT id, title, body, version, is_active, created_at FROM terms
         WHERE is_active = 1 ORDER BY version DESC LIMIT 1",
        [],
        map_term,
    )
    .optional()
}

pub fn read_signature(
    conn: &Connection,
    term_id: &str,
    organization_id: &str,
    user_id: i64,
) -> Result<Option<TermSignature>, RusqliteError> {
    conn.query_row(
        "SELECT id, term_id, organization_id, user_id, user_name, ip, user_agent, signed_at
         FROM term_signatures WHERE term_id = ?1 AND organization_id = ?2 AND user_id = ?3",
        params![term_id, organization_id, user_id],
        map_signature,
    )
    .optional()
}

/// Records a signature. Signing the same term twice keeps the first record.
pub fn record_signature(conn: &Connection, record: &SignatureRecord) -> Result<TermSignature, RusqliteError> {
    conn.execute(
        "INSERT INTO term_signatures (id, term_id, organization_id, user_id, user_name, ip, user_agent, signed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (term_id, organization_id, user_id) DO NOTHING",
        params![
            Uuid::new_v4().to_string(),
            record.term_id,
            record.organization_id,
            record.user_id,
            record.user_name,
            record.ip,
            record.user_agent,
            format_timestamp(Utc::now())
        ],
    )?;
    read_signature(conn, record.term_id, record.organization_id, record.user_id)?
        .ok_or(RusqliteError::QueryReturnedNoRows)
}
