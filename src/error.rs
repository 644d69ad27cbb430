use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("No fallback candidate left: {0}")]
    ExhaustedFallback(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

// 存储层错误只保留文本，不向调用方暴露 sea-orm 类型
impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) | AppError::JwtError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::DataIntegrity(_) => "DATA_INTEGRITY",
            AppError::ExhaustedFallback(_) => "EXHAUSTED_FALLBACK",
            AppError::ExternalApiError(_) => "EXTERNAL_API_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (actix_web::http::StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (actix_web::http::StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::JwtError(err) => {
                log::warn!("JWT error: {err}");
                (
                    actix_web::http::StatusCode::UNAUTHORIZED,
                    "Invalid access token".to_string(),
                )
            }
            AppError::NotFound(msg) => (actix_web::http::StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden(msg) => {
                log::warn!("Forbidden: {msg}");
                (actix_web::http::StatusCode::FORBIDDEN, msg.clone())
            }
            AppError::InvalidState(msg) => {
                log::warn!("Invalid state: {msg}");
                (actix_web::http::StatusCode::CONFLICT, msg.clone())
            }
            AppError::DataIntegrity(msg) => {
                log::error!("Data integrity violation: {msg}");
                (actix_web::http::StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
            }
            AppError::ExhaustedFallback(msg) => {
                log::warn!("Fallback pool exhausted: {msg}");
                (actix_web::http::StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                (actix_web::http::StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::StorageError(err) => {
                log::error!("Storage error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}
