// 审计中间件：每个请求生成一条审计记录

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::CONTENT_TYPE,
    web, Error, HttpMessage,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use serde_json::Value;

use super::logger::{AuditEntry, AuditLogger};
use crate::api::middleware::auth::AuthenticatedUser;
use crate::logging::RequestContext;

pub struct AuditMiddleware {
    logger: Arc<AuditLogger>,
}

impl AuditMiddleware {
    pub fn new(logger: Arc<AuditLogger>) -> Self {
        Self { logger }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuditMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuditMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuditMiddlewareService {
            service: Rc::new(service),
            logger: self.logger.clone(),
        }))
    }
}

pub struct AuditMiddlewareService<S> {
    service: Rc<S>,
    logger: Arc<AuditLogger>,
}

fn is_json_request(req: &ServiceRequest) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}

impl<S, B> Service<ServiceRequest> for AuditMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let logger = self.logger.clone();

        Box::pin(async move {
            let context = RequestContext::from_http_request(req.request());

            // 读出请求体后放回，后续处理器照常解析
            let body = if is_json_request(&req) {
                let bytes = req.extract::<web::Bytes>().await?;
                let parsed = serde_json::from_slice::<Value>(&bytes)
                    .ok()
                    .map(|v| logger.mask(&v));
                req.set_payload(Payload::from(bytes));
                parsed
            } else {
                None
            };

            let response = service.call(req).await?;

            let user = response
                .request()
                .extensions()
                .get::<AuthenticatedUser>()
                .cloned();

            logger.enqueue(AuditEntry {
                ts: Utc::now(),
                tag: logger.tag().to_string(),
                method: context.method.clone(),
                path: context.path.clone(),
                status: response.status().as_u16(),
                ms: context.elapsed_ms(),
                user_id: user.as_ref().map(|u| u.user_id.to_string()),
                role: user.map(|u| u.role),
                ip: context.ip_address,
                ua: context.user_agent,
                body,
                request_id: context.request_id,
                correlation_id: context.correlation_id,
            });

            Ok(response)
        })
    }
}
