use crate::middleware::AuthenticatedUser;
use crate::permissions::accessible_modules;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub fn config_modules(cfg: &mut web::ServiceConfig) {
    cfg.route("/modules", web::get().to(list_modules));
}

/// A simple handler for the root URL.
pub async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

async fn list_modules(auth_user: AuthenticatedUser) -> impl Responder {
    let user = auth_user.0;
    HttpResponse::Ok().json(json!({
        "success": true,
        "role": user.role,
        "access_level": user.access_level(),
        "organization_id": user.organization_id,
        "force_password_change": user.force_password_change,
        "modules": accessible_modules(user.user_role()),
    }))
}
