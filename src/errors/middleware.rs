// 请求日志与请求 ID 中间件

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
    time::Instant,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::middleware::auth::AuthenticatedUser;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 存放在请求扩展中的请求 ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 请求日志中间件：每个请求结束时记录一条日志，按状态码选择级别
pub struct RequestLoggingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RequestLoggingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggingMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddlewareService<S>
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

        Box::pin(async move {
            let request_id = get_request_id(&req).unwrap_or_default();
            let method = req.method().clone();
            let path = req.path().to_string();
            let start_time = Instant::now();

            let result = service.call(req).await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    error!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        error = %err,
                        duration_ms,
                        "请求处理失败"
                    );
                    return Err(err);
                }
            };

            let status = response.status().as_u16();
            // 登录后的请求附带用户 ID
            let user_id = response
                .request()
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|u| u.user_id.to_string())
                .unwrap_or_else(|| "-".to_string());

            if response.status().is_server_error() {
                error!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    user_id = %user_id,
                    status,
                    duration_ms,
                    "服务器错误"
                );
            } else if response.status().is_client_error() {
                warn!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    user_id = %user_id,
                    status,
                    duration_ms,
                    "客户端错误"
                );
            } else if is_health_check_path(&path) {
                debug!(request_id = %request_id, path = %path, status, duration_ms, "健康探测");
            } else {
                info!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    user_id = %user_id,
                    status,
                    duration_ms,
                    "请求完成"
                );
            }

            Ok(response)
        })
    }
}

/// 健康探测请求量大，只在 debug 级别记录
fn is_health_check_path(path: &str) -> bool {
    matches!(path, "/health" | "/api/live" | "/api/ready") || path.starts_with("/api/health")
}

/// 请求 ID 中间件：沿用请求头中的 X-Request-ID，否则生成新的 UUID，并回写到响应头
pub struct RequestIdMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RequestIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestIdMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestIdMiddlewareService<S>
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

        Box::pin(async move {
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|h| h.to_str().ok())
                .filter(|s| !s.trim().is_empty())
                .map(|s| RequestId(s.to_string()))
                .unwrap_or_else(RequestId::generate);

            req.extensions_mut().insert(request_id.clone());

            let mut response = service.call(req).await?;

            if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }

            Ok(response)
        })
    }
}

/// 从请求扩展中获取请求 ID
pub fn get_request_id(req: &ServiceRequest) -> Option<String> {
    req.extensions().get::<RequestId>().map(|id| id.0.clone())
}

/// 从 HTTP 请求中获取请求 ID
pub fn get_request_id_from_http(req: &actix_web::HttpRequest) -> Option<String> {
    req.extensions().get::<RequestId>().map(|id| id.0.clone())
}
