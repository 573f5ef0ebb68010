use crate::helper::onboarding_helpers::{self, OnboardingError, TaskDetailsPatch};
use crate::middleware::AuthenticatedUser;
use crate::models::OnboardingTemplate;
use crate::routes::{internal_error, json_error};
use crate::DbPool;
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct OverviewQuery {
    organization_id: Option<String>,
}

#[derive(Deserialize)]
struct TaskStatusRequest {
    status: String,
}

#[derive(Deserialize)]
struct ApplyTemplateRequest {
    organization_id: String,
    template: OnboardingTemplate,
}

pub fn config_onboarding(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/onboarding")
            .route("", web::get().to(overview_action))
            .route("/tasks/{task_id}/status", web::post().to(task_status_action))
            .route("/tasks/{task_id}", web::post().to(task_details_action))
            .route("/templates/apply", web::post().to(apply_template_action)),
    );
}

fn error_response(e: OnboardingError) -> HttpResponse {
    match e {
        OnboardingError::NotFound(_) => json_error(StatusCode::NOT_FOUND, e.to_string()),
        OnboardingError::Forbidden => json_error(StatusCode::FORBIDDEN, e.to_string()),
        OnboardingError::Validation(_) | OnboardingError::InvalidStatus(_) => {
            json_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        other => internal_error("Onboarding operation failed", &other),
    }
}

async fn overview_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    query: web::Query<OverviewQuery>,
) -> impl Responder {
    match onboarding_helpers::overview(&pool, &auth_user.0, query.organization_id.as_deref()) {
        Ok(overview) => HttpResponse::Ok().json(json!({ "success": true, "data": overview })),
        Err(e) => error_response(e),
    }
}

async fn task_status_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    payload: web::Json<TaskStatusRequest>,
) -> impl Responder {
    match onboarding_helpers::update_task_status(&pool, &auth_user.0, &path, &payload.status) {
        Ok(task) => HttpResponse::Ok().json(json!({ "success": true, "data": task })),
        Err(e) => error_response(e),
    }
}

async fn task_details_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    payload: web::Json<TaskDetailsPatch>,
) -> impl Responder {
    match onboarding_helpers::update_task_details(&pool, &auth_user.0, &path, payload.into_inner()) {
        Ok(task) => HttpResponse::Ok().json(json!({ "success": true, "data": task })),
        Err(e) => error_response(e),
    }
}

async fn apply_template_action(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    payload: web::Json<ApplyTemplateRequest>,
) -> impl Responder {
    let request = payload.into_inner();
    match onboarding_helpers::apply_template(&pool, &auth_user.0, &request.organization_id, request.template) {
        Ok(steps) => HttpResponse::Created().json(json!({ "success": true, "data": steps })),
        Err(e) => error_response(e),
    }
}
