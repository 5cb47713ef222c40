// 通用错误类型定义

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 跨包共享的错误类型
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("{code}: {message}")]
pub struct CommonError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl CommonError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: &str,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new("CONFIGURATION_ERROR", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CommonError::validation("端口不能为 0");
        assert_eq!(err.to_string(), "VALIDATION_ERROR: 端口不能为 0");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_with_details() {
        let err = CommonError::with_details("X", "消息", "细节");
        assert_eq!(err.details.as_deref(), Some("细节"));
    }
}
