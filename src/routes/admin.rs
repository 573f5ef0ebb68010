use crate::helper::auth_helpers::{self, AuthError, ClientAccountRequest};
use crate::middleware::AuthenticatedUser;
use crate::routes::{internal_error, json_error};
use crate::DbPool;
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use serde_json::json;

pub fn config_clients(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/clients")
            .route("", web::post().to(create_client_action))
            .route("/invites", web::get().to(list_invites_action)),
    );
}

fn error_response(e: AuthError) -> HttpResponse {
    match e {
        AuthError::Forbidden => json_error(StatusCode::FORBIDDEN, e.to_string()),
        AuthError::UsernameTaken(_) => json_error(StatusCode::CONFLICT, e.to_string()),
        AuthError::Validation(_) | AuthError::WeakPassword => json_error(StatusCode::BAD_REQUEST, e.to_string()),
        other => internal_error("Client administration failed", &other),
    }
}

async fn create_client_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    payload: web::Json<ClientAccountRequest>,
) -> impl Responder {
    match auth_helpers::create_client_account(&pool, &auth_user.0, payload.into_inner()) {
        Ok(user_id) => HttpResponse::Created().json(json!({ "success": true, "user_id": user_id })),
        Err(e) => error_response(e),
    }
}

async fn list_invites_action(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    match auth_helpers::latest_invites(&pool, &auth_user.0) {
        Ok(invites) => HttpResponse::Ok().json(json!({ "success": true, "data": invites })),
        Err(e) => error_response(e),
    }
}
