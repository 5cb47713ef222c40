// 错误响应格式化

use crate::errors::AssistError;
use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 错误响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
    #[serde(skip)]
    status: u16,
}

/// 错误详情
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// 从 AssistError 创建错误响应
    pub fn from_error(error: &AssistError) -> Self {
        let details = match error {
            AssistError::Database { code: Some(code), .. } => {
                Some(serde_json::json!({ "database_code": code }))
            }
            AssistError::Llm { model: Some(model), .. } => {
                Some(serde_json::json!({ "model": model }))
            }
            AssistError::Validation { field, .. } => Some(serde_json::json!({ "field": field })),
            AssistError::FileProcessing { file_name: Some(file_name), .. } => {
                Some(serde_json::json!({ "file_name": file_name }))
            }
            AssistError::ExternalService { service, .. } => {
                Some(serde_json::json!({ "service": service }))
            }
            AssistError::Timeout { operation } => {
                Some(serde_json::json!({ "operation": operation }))
            }
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetail {
                code: error.error_code().to_string(),
                message: error.to_string(),
                details,
            },
            timestamp: Utc::now(),
            request_id: None,
            status: error.status_code(),
        }
    }

    /// 设置请求 ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// 转换为 HTTP 响应
    pub fn into_http_response(self) -> HttpResponse {
        let mut response = HttpResponse::build(
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        );

        if let Some(ref request_id) = self.request_id {
            response.insert_header(("X-Request-ID", request_id.clone()));
        }

        response.json(self)
    }
}
