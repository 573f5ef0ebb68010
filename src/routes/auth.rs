use crate::config::Config;
use crate::helper::auth_helpers::{self, AuthError};
use crate::middleware::{bearer_token, AuthenticatedUser};
use crate::routes::{internal_error, json_error};
use crate::DbPool;
use actix_session::Session;
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    new_password: String,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/login", web::post().to(login_action))
        .route("/auth/logout", web::post().to(logout_action))
        .route("/auth/change_password", web::post().to(change_password_action));
}

async fn login_action(
    session: Session,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: web::Json<LoginRequest>,
) -> impl Responder {
    let ttl = Duration::seconds(config.portal.access_token_ttl_secs);
    match auth_helpers::login(&pool, &payload.username, &payload.password, ttl) {
        Ok(outcome) => {
            session.renew();
            if let Err(e) = session.insert("user_id", outcome.user.id) {
                return internal_error("Failed to start session", &e);
            }
            HttpResponse::Ok().json(json!({
                "success": true,
                "access_token": outcome.access_token,
                "access_level": outcome.access_level,
                "force_password_change": outcome.force_password_change,
            }))
        }
        Err(AuthError::InvalidCredentials) => {
            log::warn!("Failed login attempt for username '{}'.", payload.username.trim());
            json_error(StatusCode::UNAUTHORIZED, AuthError::InvalidCredentials.to_string())
        }
        Err(e) => internal_error("Login failed", &e),
    }
}

async fn logout_action(req: HttpRequest, session: Session, pool: web::Data<DbPool>) -> impl Responder {
    session.purge();
    match auth_helpers::logout(&pool, bearer_token(&req).as_deref()) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => internal_error("Logout failed", &e),
    }
}

async fn change_password_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    payload: web::Json<ChangePasswordRequest>,
) -> impl Responder {
    match auth_helpers::change_password(&pool, &auth_user.0, &payload.new_password) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "message": "Password updated." })),
        Err(e @ AuthError::WeakPassword) => json_error(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => internal_error("Failed to change password", &e),
    }
}
