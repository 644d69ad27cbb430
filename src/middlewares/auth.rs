use crate::error::AppError;
use crate::utils::JwtService;
use actix_web::http::{Method, header};
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// 无需令牌即可访问的路径
const PUBLIC_EXACT: [&str; 3] = ["/health", "/swagger-ui", "/api-docs/openapi.json"];
const PUBLIC_PREFIX: [&str; 2] = ["/swagger-ui/", "/api-docs/"];

fn is_public_path(path: &str) -> bool {
    PUBLIC_EXACT.contains(&path) || PUBLIC_PREFIX.iter().any(|p| path.starts_with(p))
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 校验上游签发的 access token，把用户 id (i32) 放进请求扩展
pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS 预检和公开路径直接放行
        if req.method() == Method::OPTIONS || is_public_path(req.path()) {
            return Box::pin(self.service.call(req));
        }

        let verified = match bearer_token(&req) {
            Some(token) => self
                .jwt_service
                .verify_access_token(token)
                .and_then(|claims| claims.user_id())
                .map_err(|e| {
                    log::warn!("Rejected access token on {}: {}", req.path(), e);
                    AppError::AuthError("Invalid access token".to_string())
                }),
            None => Err(AppError::AuthError("Missing access token".to_string())),
        };

        match verified {
            Ok(user_id) => {
                req.extensions_mut().insert(user_id);
                Box::pin(self.service.call(req))
            }
            Err(error) => Box::pin(async move { Err(error.into()) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/swagger-ui/"));
        assert!(is_public_path("/swagger-ui/index.html"));
        assert!(is_public_path("/api-docs/openapi.json"));
        assert!(!is_public_path("/api/v1/dreams"));
        assert!(!is_public_path("/healthz"));
    }

    #[test]
    fn test_bearer_token() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def"))
            .to_srv_request();
        assert_eq!(bearer_token(&req), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_srv_request();
        assert_eq!(bearer_token(&req), None);

        let req = TestRequest::default().to_srv_request();
        assert_eq!(bearer_token(&req), None);
    }
}
