use crate::helper::notification_helpers::{self, ListMode, NotificationError};
use crate::middleware::AuthenticatedUser;
use crate::models::NewNotification;
use crate::routes::{internal_error, json_error};
use crate::{AppState, DbPool};
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    mode: ListMode,
}

pub fn config_notifications(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(list_action))
            .route("", web::post().to(create_action))
            .route("/read_all", web::post().to(read_all_action))
            .route("/{notification_id}/read", web::post().to(read_action))
            .route("/{notification_id}/delete", web::post().to(delete_action)),
    );
}

fn error_response(e: NotificationError) -> HttpResponse {
    match e {
        NotificationError::NotFound(_) => json_error(StatusCode::NOT_FOUND, e.to_string()),
        NotificationError::Forbidden | NotificationError::NoAccess => json_error(StatusCode::FORBIDDEN, e.to_string()),
        NotificationError::Validation(_) => json_error(StatusCode::BAD_REQUEST, e.to_string()),
        other => internal_error("Notification operation failed", &other),
    }
}

async fn list_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> impl Responder {
    match notification_helpers::list_for_user(&pool, &state.receipt_cache, &auth_user.0, query.mode) {
        Ok(items) => {
            let unread = items.iter().filter(|n| n.read_at.is_none()).count();
            HttpResponse::Ok().json(json!({ "success": true, "unread": unread, "data": items }))
        }
        Err(e) => error_response(e),
    }
}

async fn create_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    payload: web::Json<NewNotification>,
) -> impl Responder {
    match notification_helpers::create(&pool, &auth_user.0, payload.into_inner()) {
        Ok(notification) => HttpResponse::Created().json(json!({ "success": true, "data": notification })),
        Err(e) => error_response(e),
    }
}

async fn read_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match notification_helpers::mark_read(&pool, &state.receipt_cache, &auth_user.0, &path) {
        Ok(read_at) => HttpResponse::Ok().json(json!({ "success": true, "read_at": read_at })),
        Err(e) => error_response(e),
    }
}

async fn read_all_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
) -> impl Responder {
    match notification_helpers::mark_all_read(&pool, &state.receipt_cache, &auth_user.0) {
        Ok(count) => HttpResponse::Ok().json(json!({ "success": true, "marked": count })),
        Err(e) => error_response(e),
    }
}

async fn delete_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match notification_helpers::delete(&pool, &state.receipt_cache, &auth_user.0, &path) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "message": "Notification deleted." })),
        Err(e) => error_response(e),
    }
}
