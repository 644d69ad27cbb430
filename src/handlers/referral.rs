use super::get_user_id_from_request;
use crate::models::*;
use crate::services::DreamService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/referral",
    tag = "referral",
    request_body = SubscribeReferralRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "绑定推荐人成功", body = SubscribeReferralResponse),
        (status = 403, description = "已有推荐人或形成循环"),
        (status = 404, description = "推荐码不存在")
    )
)]
/// 通过推荐码或推荐人的梦想绑定推荐人，QUART 梦想随之进入 HALF
pub async fn subscribe_to_referrer(
    service: web::Data<DreamService>,
    req: HttpRequest,
    body: web::Json<SubscribeReferralRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service
        .subscribe_to_referrer(user_id, body.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/referral/community",
    tag = "referral",
    params(
        ("level" = Option<usize>, Query, description = "层级深度 (默认4)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的社区", body = [CommunityMember]),
        (status = 400, description = "层级超出范围")
    )
)]
pub async fn community(
    service: web::Data<DreamService>,
    req: HttpRequest,
    query: web::Query<CommunityQuery>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.community(user_id, query.level).await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn referral_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/referral")
            .route("", web::post().to(subscribe_to_referrer))
            .route("/community", web::get().to(community)),
    );
}
