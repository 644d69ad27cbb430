use super::get_user_id_from_request;
use crate::models::*;
use crate::services::ReferralCounter;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/achievements/my",
    tag = "achievement",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的成就", body = [AchievementResponse]),
        (status = 401, description = "未授权")
    )
)]
pub async fn my_achievements(
    service: web::Data<ReferralCounter>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req)?;
    match service.list_achievements(user_id).await {
        Ok(list) => {
            let data: Vec<AchievementResponse> = list.into_iter().map(Into::into).collect();
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn achievement_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/achievements").route("/my", web::get().to(my_achievements)));
}
