// 通用类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API 响应信封；错误响应由服务端单独构造，这里的 error 字段保持为空
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            timestamp: Utc::now(),
            request_id: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// 分页参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PaginationParams {
    pub const MAX_PAGE_SIZE: u64 = 100;

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(20).clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1) * self.page_size()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: Some(1),
            page_size: Some(20),
        }
    }
}

/// 分页响应
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, page_size: u64) -> Self {
        let total_pages = if page_size == 0 { 0 } else { total.div_ceil(page_size) };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamp() {
        let params = PaginationParams { page: Some(0), page_size: Some(500) };
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), PaginationParams::MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 0);

        let params = PaginationParams { page: Some(3), page_size: Some(10) };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn test_envelope_message_and_request_id() {
        let resp = ApiResponse::success_with_message(3, "完成").with_request_id("req-1");
        assert!(resp.success);
        assert_eq!(resp.data, Some(3));
        assert_eq!(resp.message.as_deref(), Some("完成"));
        assert_eq!(resp.request_id.as_deref(), Some("req-1"));
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_paginated_response_flags() {
        let resp = PaginatedResponse::new(vec![1, 2], 25, 2, 10);
        assert_eq!(resp.total_pages, 3);
        assert!(resp.has_next);
        assert!(resp.has_prev);
    }
}
