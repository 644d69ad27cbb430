use actix_web::{HttpResponse, Result, web};
use serde_json::json;

pub async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": { "status": "ok" } })))
}

pub fn health_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
