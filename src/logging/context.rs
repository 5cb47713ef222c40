// 请求上下文

use actix_web::HttpRequest;
use serde::Serialize;
use std::time::Instant;

use crate::errors::{get_request_id_from_http, REQUEST_ID_HEADER};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// 单个请求的元数据，供审计日志和处理器使用
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    pub request_id: String,
    pub correlation_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub method: String,
    pub path: String,
    #[serde(skip)]
    pub start_time: Instant,
}

impl RequestContext {
    /// 从 HTTP 请求创建上下文
    ///
    /// 请求 ID 优先取中间件写入的扩展值，其次是请求头，最后生成新的 UUID；
    /// 关联 ID 缺省时等于请求 ID。
    pub fn from_http_request(req: &HttpRequest) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let request_id = get_request_id_from_http(req)
            .or_else(|| header(REQUEST_ID_HEADER))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let correlation_id = header(CORRELATION_ID_HEADER).unwrap_or_else(|| request_id.clone());

        // x-forwarded-for 取第一个地址，否则使用对端地址
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()));

        Self {
            request_id,
            correlation_id,
            ip_address,
            user_agent: header("user-agent"),
            method: req.method().to_string(),
            path: req.path().to_string(),
            start_time: Instant::now(),
        }
    }

    /// 自创建以来经过的毫秒数
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}
