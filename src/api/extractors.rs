// API 请求提取器
// 认证用户、管理员、分页参数与请求 ID

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use emergency_assist_common::PaginationParams;
use futures::future::{ready, Ready};

use crate::api::middleware::auth::AuthenticatedUser;
use crate::errors::AssistError;
use crate::logging::RequestContext;

/// 已认证用户提取器
///
/// 用户由 JwtAuthMiddleware 写入请求扩展；缺失时返回 401。
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthenticatedUser);

impl FromRequest for AuthExtractor {
    type Error = AssistError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().cloned();
        ready(
            user.map(AuthExtractor)
                .ok_or_else(|| AssistError::authentication("未登录或令牌无效")),
        )
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// 管理员提取器：未登录 401，非管理员 403
#[derive(Debug, Clone)]
pub struct AdminExtractor(pub AuthenticatedUser);

impl FromRequest for AdminExtractor {
    type Error = AssistError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.extensions().get::<AuthenticatedUser>() {
            None => Err(AssistError::authentication("未登录或令牌无效")),
            Some(user) if !user.is_admin() => Err(AssistError::authorization("需要管理员权限")),
            Some(user) => Ok(AdminExtractor(user.clone())),
        };
        ready(result)
    }
}

impl std::ops::Deref for AdminExtractor {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// 分页参数提取器，解析失败时使用默认值
#[derive(Debug, Clone)]
pub struct PaginationExtractor(pub PaginationParams);

impl FromRequest for PaginationExtractor {
    type Error = AssistError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let params = serde_urlencoded::from_str::<PaginationParams>(req.query_string())
            .unwrap_or_default();
        ready(Ok(PaginationExtractor(params)))
    }
}

/// 请求 ID 提取器
#[derive(Debug, Clone)]
pub struct RequestIdExtractor {
    pub request_id: String,
}

impl FromRequest for RequestIdExtractor {
    type Error = AssistError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let context = RequestContext::from_http_request(req);
        ready(Ok(RequestIdExtractor {
            request_id: context.request_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "tester".to_string(),
            role: role.to_string(),
            authenticated_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn test_auth_extractor_requires_user() {
        let req = TestRequest::default().to_http_request();
        let err = AuthExtractor::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code(), 401);

        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(user("employee"));
        let auth = AuthExtractor::extract(&req).await.unwrap();
        assert_eq!(auth.username, "tester");
    }

    #[actix_web::test]
    async fn test_admin_extractor_rejects_employee() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(user("employee"));
        let err = AdminExtractor::extract(&req).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(user("admin"));
        assert!(AdminExtractor::extract(&req).await.is_ok());
    }

    #[actix_web::test]
    async fn test_pagination_defaults() {
        let req = TestRequest::with_uri("/?page=3&page_size=500").to_http_request();
        let PaginationExtractor(params) = PaginationExtractor::extract(&req).await.unwrap();
        assert_eq!(params.page(), 3);
        assert_eq!(params.page_size(), PaginationParams::MAX_PAGE_SIZE);

        let req = TestRequest::with_uri("/?page=abc").to_http_request();
        let PaginationExtractor(params) = PaginationExtractor::extract(&req).await.unwrap();
        assert_eq!(params.page(), 1);
    }

    #[actix_web::test]
    async fn test_request_id_from_header() {
        let req = TestRequest::default()
            .insert_header(("x-request-id", "req-42"))
            .to_http_request();
        let extracted = RequestIdExtractor::extract(&req).await.unwrap();
        assert_eq!(extracted.request_id, "req-42");
    }
}
