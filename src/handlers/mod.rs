pub mod achievement;
pub mod donation;
pub mod dream;
pub mod health;
pub mod referral;
pub mod subscription;

pub use achievement::achievement_config;
pub use donation::donation_config;
pub use dream::dream_config;
pub use health::health_config;
pub use referral::referral_config;
pub use subscription::subscription_config;

use crate::error::{AppError, AppResult};
use actix_web::http::header;
use actix_web::{HttpMessage, HttpRequest};

/// 从请求扩展中获取用户ID（中间件在鉴权后注入）
pub(crate) fn get_user_id_from_request(req: &HttpRequest) -> AppResult<i32> {
    req.extensions()
        .get::<i32>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

/// Accept-Language 中的首选语言，如 "en-US,en;q=0.9" -> "en"
pub(crate) fn preferred_language(req: &HttpRequest) -> Option<String> {
    let raw = req.headers().get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;
    parse_language(raw)
}

fn parse_language(raw: &str) -> Option<String> {
    let tag = raw.split(',').next()?.split(';').next()?.trim();
    let primary = tag.split('-').next()?.trim();
    if primary.is_empty() || primary == "*" {
        return None;
    }
    Some(primary.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language() {
        assert_eq!(parse_language("en-US,en;q=0.9"), Some("en".into()));
        assert_eq!(parse_language("RU"), Some("ru".into()));
        assert_eq!(parse_language("*"), None);
        assert_eq!(parse_language(""), None);
    }
}
