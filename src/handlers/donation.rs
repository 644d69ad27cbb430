use super::get_user_id_from_request;
use crate::models::*;
use crate::services::DonationService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/donations/{id}/pay",
    tag = "donation",
    params(("id" = i32, Path, description = "捐赠ID")),
    request_body = PayDonationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已标记付款", body = DonationResponse),
        (status = 404, description = "捐赠不存在"),
        (status = 409, description = "捐赠不是 NEW")
    )
)]
pub async fn pay_donation(
    service: web::Data<DonationService>,
    req: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<PayDonationRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service
        .pay_donation(user_id, path.into_inner(), body.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/donations/dreams/{dream_id}",
    tag = "donation",
    params(("dream_id" = i32, Path, description = "接收捐赠的梦想ID")),
    request_body = SeedDonationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "首捐已创建", body = DonationResponse),
        (status = 403, description = "已有推荐人或不允许向该用户首捐"),
        (status = 409, description = "梦想状态不允许")
    )
)]
/// 没有推荐人的用户通过首捐绑定推荐人
pub async fn seed_donation(
    service: web::Data<DonationService>,
    req: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<SeedDonationRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service
        .seed_donation(user_id, path.into_inner(), body.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/donations/free/{dream_id}",
    tag = "donation",
    params(("dream_id" = i32, Path, description = "梦想ID")),
    request_body = FreeDonationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "捐赠已创建", body = DonationResponse),
        (status = 400, description = "金额无效"),
        (status = 409, description = "梦想不可接收捐赠")
    )
)]
pub async fn free_donation(
    service: web::Data<DonationService>,
    req: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<FreeDonationRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service
        .free_donation(Some(user_id), path.into_inner(), body.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/donations/{id}/confirm",
    tag = "donation",
    params(("id" = i32, Path, description = "捐赠ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "确认成功", body = ConfirmDonationResponse),
        (status = 404, description = "捐赠不存在"),
        (status = 409, description = "捐赠不是待确认状态")
    )
)]
/// 接收方确认收款，累加梦想金额并推进发起方梦想状态
pub async fn confirm_donation(
    service: web::Data<DonationService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.confirm_donation(user_id, path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/donations/{id}/fail",
    tag = "donation",
    params(("id" = i32, Path, description = "捐赠ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "failed=false 表示捐赠已是终态"),
        (status = 404, description = "捐赠不存在")
    )
)]
pub async fn fail_donation(
    service: web::Data<DonationService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.fail_donation(user_id, path.into_inner()).await {
        Ok(failed) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "failed": failed }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn donation_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/donations")
            .route("/dreams/{dream_id}", web::post().to(seed_donation))
            .route("/free/{dream_id}", web::post().to(free_donation))
            .route("/{id}/pay", web::post().to(pay_donation))
            .route("/{id}/confirm", web::post().to(confirm_donation))
            .route("/{id}/fail", web::post().to(fail_donation)),
    );
}
