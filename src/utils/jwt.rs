use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// 上游认证服务签发的 token 载荷
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "access" or "refresh"
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i32> {
        self.sub
            .parse::<i32>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// 签发 access token（本服务不对外签发，供运维脚本与测试使用）
    pub fn generate_access_token(&self, user_id: i32, expires_in: i64) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != "access" {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip() {
        let jwt = JwtService::new("secret");
        let token = jwt.generate_access_token(42, 60).unwrap();
        let claims = jwt.verify_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtService::new("a").generate_access_token(1, 60).unwrap();
        assert!(JwtService::new("b").verify_access_token(&token).is_err());
    }

    #[test]
    fn test_refresh_token_rejected() {
        let jwt = JwtService::new("secret");
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "1".into(),
            exp: now + 60,
            iat: now,
            token_type: "refresh".into(),
        };
        let token = encode(&Header::default(), &claims, &jwt.encoding_key).unwrap();
        assert!(matches!(
            jwt.verify_access_token(&token),
            Err(AppError::AuthError(_))
        ));
    }
}
