use crate::models::db_operations::{format_timestamp, parse_timestamp};
use crate::models::{ClientInvite, PortalUser};
use crate::permissions::UserRole;
use bcrypt::{hash, verify, BcryptError};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

const USER_COLUMNS: &str =
    "id, username, name, role, organization_id, is_active, force_password_change, last_login_time";

fn map_user(row: &Row) -> rusqlite::Result<PortalUser> {
    Ok(PortalUser {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        organization_id: row.get(4)?,
        is_active: row.get(5)?,
        force_password_change: row.get(6)?,
        last_login_time: row.get(7)?,
    })
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub name: Option<&'a str>,
    pub role: UserRole,
    pub organization_id: Option<&'a str>,
    pub force_password_change: bool,
}

pub fn create_user(conn: &Connection, user: &NewUser) -> Result<i64, RusqliteError> {
    let hashed_password = hash(user.password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, name, role, organization_id, force_password_change)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.username,
            hashed_password,
            user.name,
            user.role.as_str(),
            user.organization_id,
            user.force_password_change
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<PortalUser>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let users = stmt.query_map([], map_user)?.collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<PortalUser>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [user_id],
        map_user,
    )
    .optional()
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Result<Option<PortalUser>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        [username],
        map_user,
    )
    .optional()
}

/// Returns the user only when the account is active and the password matches.
pub fn verify_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<Option<PortalUser>, RusqliteError> {
    let res: Option<(String, bool)> = conn
        .query_row(
            "SELECT password_hash, is_active FROM users WHERE username = ?1",
            [username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match res {
        Some((hash, true)) if verify(password, &hash).unwrap_or(false) => read_user_by_username(conn, username),
        _ => Ok(None),
    }
}

pub fn update_last_login_time(conn: &Connection, user_id: i64) -> Result<(), RusqliteError> {
    let now = format_timestamp(Utc::now());
    conn.execute("UPDATE users SET last_login_time = ?1 WHERE id = ?2", params![now, user_id])?;
    Ok(())
}

/// Sets a new password and clears the forced-change flag.
pub fn update_password(conn: &Connection, user_id: i64, new_password: &str) -> Result<usize, RusqliteError> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1, force_password_change = 0 WHERE id = ?2",
        params![hashed_password, user_id],
    )
}

// --- Access tokens ---

pub fn create_access_token(conn: &Connection, user_id: i64, ttl: Duration) -> Result<String, RusqliteError> {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let expires_at = format_timestamp(Utc::now() + ttl);
    conn.execute(
        "INSERT INTO access_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, expires_at],
    )?;
    Ok(token)
}

/// Resolves an unexpired token to its active owner.
pub fn read_user_by_token(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<PortalUser>, RusqliteError> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM access_tokens WHERE token = ?1",
            [token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((user_id, expires_at)) = row else {
        return Ok(None);
    };
    if parse_timestamp(&expires_at)? <= now {
        return Ok(None);
    }
    Ok(read_user_by_id(conn, user_id)?.filter(|u| u.is_active))
}

pub fn revoke_access_token(conn: &Connection, token: &str) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM access_tokens WHERE token = ?1", [token])
}

pub fn purge_expired_tokens(conn: &Connection, now: DateTime<Utc>) -> Result<usize, RusqliteError> {
    conn.execute(
        "DELETE FROM access_tokens WHERE expires_at <= ?1",
        [format_timestamp(now)],
    )
}

// --- Client invites ---

pub struct InviteRecord<'a> {
    pub target_username: &'a str,
    pub target_role: &'a str,
    pub organization_id: &'a str,
    pub target_user_id: Option<i64>,
    pub status: &'a str,
    pub result: &'a str,
    pub created_by: i64,
}

pub fn record_client_invite(conn: &Connection, invite: &InviteRecord) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO client_invites (target_username, target_role, organization_id, target_user_id, status, result, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            invite.target_username,
            invite.target_role,
            invite.organization_id,
            invite.target_user_id,
            invite.status,
            invite.result,
            invite.created_by,
            format_timestamp(Utc::now())
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_latest_client_invites(conn: &Connection, limit: u32) -> Result<Vec<ClientInvite>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, target_username, target_role, organization_id, target_user_id, status, result, created_by, created_at
         FROM client_invites ORDER BY id DESC LIMIT ?1",
    )?;
    let invites = stmt
        .query_map([limit], |row| {
            Ok(ClientInvite {
                id: row.get(0)?,
                target_username: row.get(1)?,
                target_role: row.get(2)?,
                organization_id: row.get(3)?,
                target_user_id: row.get(4)?,
                status: row.get(5)?,
                result: row.get(6)?,
                created_by: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(invites)
}
