use crate::config::Config;
use crate::helper::storage_helpers::{authorize_sign_request, clamp_expiry, resolve_storage_path, StorageError};
use crate::middleware::BearerUser;
use crate::routes::{internal_error, json_error};
use crate::AppState;
use actix_files::NamedFile;
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

#[derive(Deserialize)]
struct SignRequest {
    path: Option<String>,
    #[serde(rename = "expiresIn")]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct SignedQuery {
    expires: Option<i64>,
    signature: Option<String>,
}

/// Mounted under `/api`.
pub fn config_sign_url(cfg: &mut web::ServiceConfig) {
    cfg.route("/sign-url", web::post().to(sign_url_post))
        .route("/sign-url", web::get().to(sign_url_get));
}

/// Mounted at the root, outside the session scope.
pub fn config_storage(cfg: &mut web::ServiceConfig) {
    cfg.route("/storage/{path:.*}", web::get().to(serve_signed_file));
}

fn storage_error_response(e: StorageError) -> HttpResponse {
    match e {
        StorageError::MissingPath | StorageError::InvalidPath(_) => json_error(StatusCode::BAD_REQUEST, e.to_string()),
        StorageError::NoOrganization | StorageError::PathNotAllowed | StorageError::BadSignature => {
            json_error(StatusCode::FORBIDDEN, e.to_string())
        }
        StorageError::Expired => json_error(StatusCode::GONE, e.to_string()),
        other => internal_error("Storage operation failed", &other),
    }
}

fn sign(user: BearerUser, state: &AppState, config: &Config, request: SignRequest) -> HttpResponse {
    let path = request.path.unwrap_or_default();
    let path = path.trim();
    if let Err(e) = authorize_sign_request(user.0.data_scope(), path) {
        log::warn!("Refused to sign '{}' for user {}: {}", path, user.0.id, e);
        return storage_error_response(e);
    }
    if let Err(e) = resolve_storage_path(Path::new(&config.media_path), path) {
        return storage_error_response(e);
    }

    let seconds = clamp_expiry(
        request.expires_in,
        config.portal.signed_url_default_expiry_secs,
        config.portal.signed_url_max_expiry_secs,
    );
    let expires_at = Utc::now() + Duration::seconds(seconds);
    match state.url_signer.signed_url(path, expires_at.timestamp()) {
        Ok(signed_url) => HttpResponse::Ok().json(json!({
            "success": true,
            "signedUrl": signed_url,
            "expiresAt": expires_at,
        })),
        Err(e) => storage_error_response(e),
    }
}

async fn sign_url_post(
    user: BearerUser,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    payload: web::Json<SignRequest>,
) -> impl Responder {
    sign(user, &state, &config, payload.into_inner())
}

async fn sign_url_get(
    user: BearerUser,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    query: web::Query<SignRequest>,
) -> impl Responder {
    sign(user, &state, &config, query.into_inner())
}

async fn serve_signed_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    path: web::Path<String>,
    query: web::Query<SignedQuery>,
) -> HttpResponse {
    let relative = path.into_inner();
    let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
        return storage_error_response(StorageError::BadSignature);
    };
    if let Err(e) = state.url_signer.verify(&relative, expires, signature, Utc::now()) {
        return storage_error_response(e);
    }
    let file_path = match resolve_storage_path(Path::new(&config.media_path), &relative) {
        Ok(p) => p,
        Err(e) => return storage_error_response(e),
    };
    match NamedFile::open_async(&file_path).await {
        Ok(file) => file.into_response(&req),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => json_error(StatusCode::NOT_FOUND, "File not found."),
        Err(e) => internal_error("Failed to open file", &e),
    }
}
