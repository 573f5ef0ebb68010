use crate::helper::terms_helpers::{self, SigningContext, TermsError};
use crate::middleware::AuthenticatedUser;
use crate::models::NewTerm;
use crate::routes::{internal_error, json_error};
use crate::DbPool;
use actix_web::{http::header, http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use serde_json::json;

pub fn config_terms(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/terms")
            .route("", web::post().to(publish_action))
            .route("/active", web::get().to(active_action))
            .route("/status", web::get().to(status_action))
            .route("/sign", web::post().to(sign_action)),
    );
}

fn error_response(e: TermsError) -> HttpResponse {
    match e {
        TermsError::NoActiveTerm => json_error(StatusCode::NOT_FOUND, e.to_string()),
        TermsError::Forbidden | TermsError::NoOrganization => json_error(StatusCode::FORBIDDEN, e.to_string()),
        TermsError::Validation(_) => json_error(StatusCode::BAD_REQUEST, e.to_string()),
        other => internal_error("Terms operation failed", &other),
    }
}

async fn active_action(_auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    match terms_helpers::active_term(&pool) {
        Ok(Some(term)) => HttpResponse::Ok().json(json!({ "success": true, "data": term })),
        Ok(None) => error_response(TermsError::NoActiveTerm),
        Err(e) => error_response(e),
    }
}

async fn status_action(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    match terms_helpers::term_status(&pool, &auth_user.0) {
        Ok(status) => HttpResponse::Ok().json(json!({ "success": true, "data": status })),
        Err(e) => error_response(e),
    }
}

async fn sign_action(req: HttpRequest, auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    let context = SigningContext {
        ip: req.connection_info().realip_remote_addr().map(str::to_string),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    match terms_helpers::sign_active_term(&pool, &auth_user.0, context) {
        Ok(signature) => HttpResponse::Ok().json(json!({ "success": true, "data": signature })),
        Err(e) => error_response(e),
    }
}

async fn publish_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    payload: web::Json<NewTerm>,
) -> impl Responder {
    match terms_helpers::publish_term(&pool, &auth_user.0, payload.into_inner()) {
        Ok(term) => HttpResponse::Created().json(json!({ "success": true, "data": term })),
        Err(e) => error_response(e),
    }
}
