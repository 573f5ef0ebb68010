use crate::calendar::TransitionRejection;
use crate::config::Config;
use crate::helper::calendar_helpers::{self, CalendarHelperError, PostListParams};
use crate::helper::storage_helpers::StorageError;
use crate::middleware::AuthenticatedUser;
use crate::models::{NewPost, PostDetailsPatch};
use crate::routes::{internal_error, json_error};
use crate::DbPool;
use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use redb::Database;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

#[derive(Deserialize)]
struct CommentRequest {
    body: String,
}

#[derive(Deserialize)]
struct ImportQuery {
    organization_id: Option<String>,
}

pub fn config_calendar(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/posts")
            .route("", web::get().to(list_posts_action))
            .route("", web::post().to(create_post_action))
            .route("/import", web::post().to(import_posts_action))
            .route("/{post_id}", web::get().to(get_post_action))
            .route("/{post_id}/transitions", web::get().to(transitions_action))
            .route("/{post_id}/status", web::post().to(change_status_action))
            .route("/{post_id}/details", web::post().to(update_details_action))
            .route("/{post_id}/archive", web::post().to(archive_action))
            .route("/{post_id}/delete", web::post().to(delete_action))
            .route("/{post_id}/media", web::post().to(upload_media_action))
            .route("/{post_id}/comments", web::get().to(list_comments_action))
            .route("/{post_id}/comments", web::post().to(add_comment_action)),
    );
}

fn error_response(e: CalendarHelperError) -> HttpResponse {
    match &e {
        CalendarHelperError::NotFound(_) => json_error(StatusCode::NOT_FOUND, e.to_string()),
        CalendarHelperError::Forbidden(_) | CalendarHelperError::Transition(TransitionRejection::NotOffered) => {
            json_error(StatusCode::FORBIDDEN, e.to_string())
        }
        CalendarHelperError::Transition(TransitionRejection::Structural) => json_error(StatusCode::CONFLICT, e.to_string()),
        CalendarHelperError::Calendar(_) | CalendarHelperError::Import(_) | CalendarHelperError::Validation(_) => {
            json_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        CalendarHelperError::Storage(StorageError::TooLarge(_)) => json_error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
        CalendarHelperError::Storage(StorageError::InvalidPath(_) | StorageError::Multipart(_)) => {
            json_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        CalendarHelperError::Db(_)
        | CalendarHelperError::Storage(_)
        | CalendarHelperError::Portal(_)
        | CalendarHelperError::Pool(_) => internal_error("Calendar operation failed", &e),
    }
}

async fn list_posts_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    config: web::Data<Config>,
    params: web::Query<PostListParams>,
) -> impl Responder {
    let (query, page) = match params.into_inner().into_query(config.portal.page_size) {
        Ok(parsed) => parsed,
        Err(e) => return error_response(e),
    };
    match calendar_helpers::list(&db, &auth_user.0, &query, page) {
        Ok(result) => HttpResponse::Ok().json(json!({ "success": true, "data": result })),
        Err(e) => error_response(e),
    }
}

async fn get_post_action(auth_user: AuthenticatedUser, db: web::Data<Database>, path: web::Path<String>) -> impl Responder {
    match calendar_helpers::get(&db, &auth_user.0, &path) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "data": post })),
        Err(e) => error_response(e),
    }
}

async fn transitions_action(auth_user: AuthenticatedUser, db: web::Data<Database>, path: web::Path<String>) -> impl Responder {
    match calendar_helpers::transitions(&db, &auth_user.0, &path) {
        Ok((post, offered)) => HttpResponse::Ok().json(json!({
            "success": true,
            "current": post.status,
            "access_level": auth_user.0.access_level(),
            "transitions": offered,
        })),
        Err(e) => error_response(e),
    }
}

async fn create_post_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    payload: web::Json<NewPost>,
) -> impl Responder {
    match calendar_helpers::create(&db, &auth_user.0, payload.into_inner()) {
        Ok(post) => HttpResponse::Created().json(json!({ "success": true, "data": post })),
        Err(e) => error_response(e),
    }
}

async fn import_posts_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    query: web::Query<ImportQuery>,
    body: web::Bytes,
) -> impl Responder {
    match calendar_helpers::import(&db, &auth_user.0, query.organization_id.as_deref(), &body) {
        Ok(created) => HttpResponse::Created().json(json!({
            "success": true,
            "created": created.len(),
            "data": created,
        })),
        Err(e) => error_response(e),
    }
}

async fn change_status_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    path: web::Path<String>,
    payload: web::Json<StatusRequest>,
) -> impl Responder {
    match calendar_helpers::change_status(&db, &auth_user.0, &path, &payload.status) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "data": post })),
        Err(e) => error_response(e),
    }
}

async fn update_details_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    path: web::Path<String>,
    payload: web::Json<PostDetailsPatch>,
) -> impl Responder {
    match calendar_helpers::update_details(&db, &auth_user.0, &path, payload.into_inner()) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "data": post })),
        Err(e) => error_response(e),
    }
}

async fn archive_action(auth_user: AuthenticatedUser, db: web::Data<Database>, path: web::Path<String>) -> impl Responder {
    match calendar_helpers::toggle_archive(&db, &auth_user.0, &path) {
        Ok(post) => HttpResponse::Ok().json(json!({
            "success": true,
            "archived": post.is_archived(),
            "data": post,
        })),
        Err(e) => error_response(e),
    }
}

async fn delete_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> impl Responder {
    match calendar_helpers::delete(&db, &auth_user.0, &path) {
        Ok(post) => {
            if let Err(e) = calendar_helpers::purge_comments(&pool, &post.id) {
                log::warn!("Comments of deleted post {} were not removed: {}", post.id, e);
            }
            HttpResponse::Ok().json(json!({ "success": true, "message": "Post deleted successfully." }))
        }
        Err(e) => error_response(e),
    }
}

async fn upload_media_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    config: web::Data<Config>,
    path: web::Path<String>,
    payload: Multipart,
) -> impl Responder {
    match calendar_helpers::upload_media(&db, &config, &auth_user.0, &path, payload).await {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "data": post })),
        Err(e) => error_response(e),
    }
}

async fn list_comments_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> impl Responder {
    match calendar_helpers::list_comments(&db, &pool, &auth_user.0, &path) {
        Ok(comments) => HttpResponse::Ok().json(json!({ "success": true, "data": comments })),
        Err(e) => error_response(e),
    }
}

async fn add_comment_action(
    auth_user: AuthenticatedUser,
    db: web::Data<Database>,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    payload: web::Json<CommentRequest>,
) -> impl Responder {
    match calendar_helpers::add_comment(&db, &pool, &auth_user.0, &path, &payload.body) {
        Ok(comment) => HttpResponse::Created().json(json!({ "success": true, "data": comment })),
        Err(e) => error_response(e),
    }
}
