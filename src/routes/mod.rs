use actix_web::{http::StatusCode, web, HttpResponse};
use serde_json::json;

pub mod admin;
pub mod auth;
pub mod calendar;
pub mod notifications;
pub mod onboarding;
pub mod public;
pub mod storage;
pub mod terms;

pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "success": false, "error": message.into() }))
}

/// Logs the real cause and answers with a generic 500.
pub(crate) fn internal_error(context: &str, cause: &dyn std::fmt::Display) -> HttpResponse {
    log::error!("{}: {}", context, cause);
    json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{}.", context))
}

/// Everything mounted under `/api`.
pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.configure(auth::config_auth)
        .configure(public::config_modules)
        .configure(calendar::config_calendar)
        .configure(storage::config_sign_url)
        .configure(notifications::config_notifications)
        .configure(onboarding::config_onboarding)
        .configure(terms::config_terms)
        .configure(admin::config_clients);
}
