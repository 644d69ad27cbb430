use super::{get_user_id_from_request, preferred_language};
use crate::models::*;
use crate::services::{AllocationService, DreamService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/dreams",
    tag = "dream",
    request_body = CreateDreamRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建梦想成功", body = DreamResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "未授权")
    )
)]
pub async fn create_dream(
    service: web::Data<DreamService>,
    req: HttpRequest,
    body: web::Json<CreateDreamRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.create_dream(user_id, body.into_inner(), false).await {
        Ok(dream) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": dream }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/dreams/draft",
    tag = "dream",
    request_body = CreateDreamRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "保存草稿成功", body = DreamResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "未授权")
    )
)]
pub async fn create_draft(
    service: web::Data<DreamService>,
    req: HttpRequest,
    body: web::Json<CreateDreamRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.create_dream(user_id, body.into_inner(), true).await {
        Ok(dream) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": dream }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/dreams/draft/{id}",
    tag = "dream",
    params(("id" = i32, Path, description = "梦想ID")),
    request_body = UpdateDreamRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新草稿成功", body = DreamResponse),
        (status = 404, description = "草稿不存在")
    )
)]
pub async fn update_draft(
    service: web::Data<DreamService>,
    req: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<UpdateDreamRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service
        .update_draft(user_id, path.into_inner(), body.into_inner())
        .await
    {
        Ok(dream) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": dream }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/dreams/{id}/submit",
    tag = "dream",
    params(("id" = i32, Path, description = "梦想ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "提交成功", body = DreamResponse),
        (status = 404, description = "草稿不存在"),
        (status = 409, description = "状态已变化")
    )
)]
pub async fn submit_draft(
    service: web::Data<DreamService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.submit_draft(user_id, path.into_inner()).await {
        Ok(dream) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": dream }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/dreams/{id}",
    tag = "dream",
    params(("id" = i32, Path, description = "梦想ID")),
    request_body = UpdateDreamRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功", body = DreamResponse),
        (status = 403, description = "已收到确认的捐赠"),
        (status = 409, description = "当前状态不可修改")
    )
)]
pub async fn update_dream(
    service: web::Data<DreamService>,
    req: HttpRequest,
    path: web::Path<i32>,
    body: web::Json<UpdateDreamRequest>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service
        .update_dream(user_id, path.into_inner(), body.into_inner())
        .await
    {
        Ok(dream) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": dream }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/dreams/{id}",
    tag = "dream",
    params(("id" = i32, Path, description = "梦想ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 403, description = "已有捐赠"),
        (status = 404, description = "梦想不存在")
    )
)]
pub async fn delete_dream(
    service: web::Data<DreamService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.delete_dream(user_id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/dreams/{id}/close",
    tag = "dream",
    params(("id" = i32, Path, description = "梦想ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "关闭成功", body = DreamResponse),
        (status = 409, description = "梦想不是 ACTIVE")
    )
)]
pub async fn close_dream(
    service: web::Data<DreamService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.close_dream(user_id, path.into_inner()).await {
        Ok(dream) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": dream }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/dreams/{id}/payment-details",
    tag = "dream",
    params(("id" = i32, Path, description = "梦想ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "登记成功", body = DreamResponse),
        (status = 409, description = "当前状态不可登记")
    )
)]
pub async fn record_payment_details(
    service: web::Data<DreamService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service
        .record_payment_details(user_id, path.into_inner())
        .await
    {
        Ok(dream) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": dream }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/dreams/{id}/referrals",
    tag = "dream",
    params(("id" = i32, Path, description = "梦想ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "分级捐赠列表", body = [ReferralDonationResponse]),
        (status = 403, description = "已有其他梦想在激活中"),
        (status = 404, description = "梦想不存在或不是 HALF"),
        (status = 503, description = "暂无可用的接收梦想")
    )
)]
/// 获取梦想的分级捐赠；首次请求时生成，之后自动替换失效项
pub async fn get_referral_donations(
    service: web::Data<AllocationService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    let language = preferred_language(&req);
    match service
        .allocate(user_id, path.into_inner(), language.as_deref())
        .await
    {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn dream_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dreams")
            .route("", web::post().to(create_dream))
            .route("/draft", web::post().to(create_draft))
            .route("/draft/{id}", web::patch().to(update_draft))
            .route("/{id}", web::patch().to(update_dream))
            .route("/{id}", web::delete().to(delete_dream))
            .route("/{id}/submit", web::post().to(submit_draft))
            .route("/{id}/close", web::post().to(close_dream))
            .route("/{id}/payment-details", web::post().to(record_payment_details))
            .route("/{id}/referrals", web::get().to(get_referral_donations)),
    );
}
