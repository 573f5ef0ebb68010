use crate::models::db_operations::users_db_operations::{self, InviteRecord, NewUser};
use crate::models::{ClientInvite, PortalUser};
use crate::permissions::{AccessLevel, UserRole};
use crate::DbPool;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const INVITE_HISTORY_LIMIT: u32 = 50;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters long.")]
    WeakPassword,
    #[error("You do not have permission to manage clients.")]
    Forbidden,
    #[error("Username '{0}' already exists.")]
    UsernameTaken(String),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    #[serde(skip)]
    pub user: PortalUser,
    pub access_token: String,
    pub access_level: AccessLevel,
    pub force_password_change: bool,
}

/// Verifies credentials, stamps the login time and issues a bearer token.
pub fn login(pool: &DbPool, username: &str, password: &str, token_ttl: Duration) -> Result<LoginOutcome, AuthError> {
    let conn = pool.get()?;
    let user = users_db_operations::verify_credentials(&conn, username.trim(), password)?
        .ok_or(AuthError::InvalidCredentials)?;
    users_db_operations::update_last_login_time(&conn, user.id)?;
    let removed = users_db_operations::purge_expired_tokens(&conn, chrono::Utc::now())?;
    if removed > 0 {
        log::debug!("Purged {} expired access tokens", removed);
    }
    let access_token = users_db_operations::create_access_token(&conn, user.id, token_ttl)?;
    Ok(LoginOutcome {
        access_level: user.access_level(),
        force_password_change: user.force_password_change,
        access_token,
        user,
    })
}

pub fn logout(pool: &DbPool, token: Option<&str>) -> Result<(), AuthError> {
    if let Some(token) = token {
        let conn = pool.get()?;
        users_db_operations::revoke_access_token(&conn, token)?;
    }
    Ok(())
}

pub fn change_password(pool: &DbPool, user: &PortalUser, new_password: &str) -> Result<(), AuthError> {
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }
    let conn = pool.get()?;
    users_db_operations::update_password(&conn, user.id, new_password)?;
    log::info!("User {} changed their password.", user.id);
    Ok(())
}

fn default_force_change() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ClientAccountRequest {
    pub username: String,
    pub name: Option<String>,
    pub organization_id: String,
    pub role: String,
    pub temp_password: String,
    #[serde(default = "default_force_change")]
    pub force_password_change: bool,
}

/// Creates a client login. Every attempt is recorded as an invite with
/// status `success`, `exists` or `error`.
pub fn create_client_account(pool: &DbPool, admin: &PortalUser, request: ClientAccountRequest) -> Result<i64, AuthError> {
    if !admin.access_level().can_manage_clients() {
        return Err(AuthError::Forbidden);
    }
    let username = request.username.trim();
    let organization_id = request.organization_id.trim();
    let role = match request.role.trim().parse::<UserRole>() {
        Ok(role) if role.is_client() => role,
        _ => {
            return Err(AuthError::Validation(format!(
                "Role must be 'client_owner' or 'client_user', got '{}'.",
                request.role
            )))
        }
    };
    if username.is_empty() || organization_id.is_empty() {
        return Err(AuthError::Validation("Username and organization are required.".to_string()));
    }
    if request.temp_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }

    let conn = pool.get()?;
    let base = InviteRecord {
        target_username: username,
        target_role: role.as_str(),
        organization_id,
        target_user_id: None,
        status: "error",
        result: "",
        created_by: admin.id,
    };

    if let Some(existing) = users_db_operations::read_user_by_username(&conn, username)? {
        users_db_operations::record_client_invite(
            &conn,
            &InviteRecord { target_user_id: Some(existing.id), status: "exists", result: "Username already exists.", ..base },
        )?;
        return Err(AuthError::UsernameTaken(username.to_string()));
    }

    let created = users_db_operations::create_user(
        &conn,
        &NewUser {
            username,
            password: &request.temp_password,
            name: request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            role,
            organization_id: Some(organization_id),
            force_password_change: request.force_password_change,
        },
    );
    match created {
        Ok(user_id) => {
            users_db_operations::record_client_invite(
                &conn,
                &InviteRecord { target_user_id: Some(user_id), status: "success", result: "Client account created.", ..base },
            )?;
            log::info!("Admin {} created client '{}' for organization {}.", admin.id, username, organization_id);
            Ok(user_id)
        }
        Err(e) => {
            let message = e.to_string();
            let failed = InviteRecord { result: &message, ..base };
            if let Err(record_err) = users_db_operations::record_client_invite(&conn, &failed) {
                log::error!("Failed to record client invite for '{}': {}", username, record_err);
            }
            Err(AuthError::Db(e))
        }
    }
}

pub fn latest_invites(pool: &DbPool, admin: &PortalUser) -> Result<Vec<ClientInvite>, AuthError> {
    if !admin.access_level().can_manage_clients() {
        return Err(AuthError::Forbidden);
    }
    let conn = pool.get()?;
    Ok(users_db_operations::read_latest_client_invites(&conn, INVITE_HISTORY_LIMIT)?)
}
