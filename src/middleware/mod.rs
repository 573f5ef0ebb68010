use crate::models::db_operations::users_db_operations;
use crate::models::PortalUser;
use crate::DbPool;
use actix_session::SessionExt;
use actix_web::{dev, error, web, FromRequest, HttpRequest};
use chrono::Utc;
use std::future::{ready, Ready};

/// The `Authorization: Bearer <token>` value, if present.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn pool_of(req: &HttpRequest) -> Result<&web::Data<DbPool>, actix_web::Error> {
    req.app_data::<web::Data<DbPool>>().ok_or_else(|| {
        log::error!("Connection pool is not registered as app data.");
        error::ErrorInternalServerError("Server misconfiguration.")
    })
}

fn user_from_token(req: &HttpRequest, token: &str) -> Result<PortalUser, actix_web::Error> {
    let pool = pool_of(req)?;
    let conn = pool.get().map_err(|e| {
        log::error!("Failed to get DB connection for token lookup: {}", e);
        error::ErrorInternalServerError("Database unavailable.")
    })?;
    match users_db_operations::read_user_by_token(&conn, token, Utc::now()) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(error::ErrorUnauthorized("Invalid or expired token.")),
        Err(e) => {
            log::error!("Token lookup failed: {}", e);
            Err(error::ErrorInternalServerError("Database error."))
        }
    }
}

fn user_from_session(req: &HttpRequest) -> Result<Option<PortalUser>, actix_web::Error> {
    let session = req.get_session();
    let Ok(Some(user_id)) = session.get::<i64>("user_id") else {
        return Ok(None);
    };
    let pool = pool_of(req)?;
    let conn = pool.get().map_err(|e| {
        log::error!("Failed to get DB connection for session lookup: {}", e);
        error::ErrorInternalServerError("Database unavailable.")
    })?;
    match users_db_operations::read_user_by_id(&conn, user_id) {
        Ok(user) => Ok(user.filter(|u| u.is_active)),
        Err(e) => {
            log::error!("Session user lookup failed: {}", e);
            Err(error::ErrorInternalServerError("Database error."))
        }
    }
}

/// The caller, resolved from the session cookie or else a bearer token.
pub struct AuthenticatedUser(pub PortalUser);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let resolved = match user_from_session(req) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => match bearer_token(req) {
                Some(token) => user_from_token(req, &token),
                None => Err(error::ErrorUnauthorized("Not logged in.")),
            },
            Err(e) => Err(e),
        };
        ready(resolved.map(AuthenticatedUser))
    }
}

/// The caller, resolved from a bearer token only.
pub struct BearerUser(pub PortalUser);

impl FromRequest for BearerUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let resolved = match bearer_token(req) {
            Some(token) => user_from_token(req, &token),
            None => Err(error::ErrorUnauthorized("Missing bearer token.")),
        };
        ready(resolved.map(BearerUser))
    }
}
