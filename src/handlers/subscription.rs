use super::get_user_id_from_request;
use crate::models::*;
use crate::services::DreamService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/subscription",
    tag = "subscription",
    request_body = SubscriptionRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订阅已更新", body = SubscriptionResponse),
        (status = 404, description = "用户不存在")
    )
)]
/// 计费服务回调: 更新订阅期限，必要时分配推荐码并激活 WHOLE 梦想
pub async fn apply_subscription(
    service: web::Data<DreamService>,
    req: HttpRequest,
    body: web::Json<SubscriptionRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.apply_subscription(user_id, body.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn subscription_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/subscription", web::post().to(apply_subscription));
}
