// 认证中间件
// 解析 Bearer JWT 并把用户信息放入请求扩展；是否必须登录由提取器决定

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use tracing::debug;
use uuid::Uuid;

use crate::db::entities::user::UserRole;
use crate::errors::{AssistError, AssistResult};

const ISSUER: &str = "emergency-assist";

/// JWT 声明结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// 用户 ID
    pub sub: String,
    pub username: String,
    /// admin / employee
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// 已认证用户
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub authenticated_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin.as_str()
    }
}

/// JWT 工具
pub struct JwtUtils;

impl JwtUtils {
    /// 生成 HS256 令牌
    pub fn generate_token(
        user_id: Uuid,
        username: &str,
        role: &str,
        secret_key: &str,
        expires_in_secs: u64,
    ) -> AssistResult<String> {
        let now = Utc::now();
        let exp = now + chrono::Duration::seconds(expires_in_secs as i64);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret_key.as_bytes()),
        )
        .map_err(|e| AssistError::internal(format!("JWT 生成失败: {}", e)))
    }

    /// 校验签名和过期时间
    pub fn verify_token(token: &str, secret_key: &str) -> AssistResult<AuthenticatedUser> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);

        let data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(secret_key.as_bytes()),
            &validation,
        )?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AssistError::authentication("令牌中的用户 ID 无效"))?;

        Ok(AuthenticatedUser {
            user_id,
            username: data.claims.username,
            role: data.claims.role,
            authenticated_at: Utc::now(),
        })
    }

    /// 取出 `Bearer ` 之后的部分
    pub fn bearer_token(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// JWT 认证中间件
pub struct JwtAuthMiddleware {
    secret_key: Rc<str>,
}

impl JwtAuthMiddleware {
    pub fn new(secret_key: impl AsRef<str>) -> Self {
        Self {
            secret_key: Rc::from(secret_key.as_ref()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            secret_key: self.secret_key.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    secret_key: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let secret_key = self.secret_key.clone();

        Box::pin(async move {
            let token = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(JwtUtils::bearer_token)
                .map(str::to_string);

            if let Some(token) = token {
                match JwtUtils::verify_token(&token, &secret_key) {
                    Ok(user) => {
                        req.extensions_mut().insert(user);
                    }
                    Err(e) => debug!(error = %e, "忽略无效的访问令牌"),
                }
            }

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-with-at-least-32-chars!!";

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = JwtUtils::generate_token(user_id, "suzuki", "admin", SECRET, 3600).unwrap();

        let user = JwtUtils::verify_token(&token, SECRET).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.username, "suzuki");
        assert!(user.is_admin());
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let token =
            JwtUtils::generate_token(Uuid::new_v4(), "sato", "employee", SECRET, 3600).unwrap();
        let result = JwtUtils::verify_token(&token, "another-secret-key-with-32-characters");
        assert!(matches!(result, Err(AssistError::Authentication { .. })));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(JwtUtils::bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(JwtUtils::bearer_token("Basic abc"), None);
        assert_eq!(JwtUtils::bearer_token("Bearer   "), None);
    }
}
