// 统一错误类型定义

use actix_web::{HttpResponse, ResponseError};
use emergency_assist_common::CommonError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// 应用统一错误类型
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "error_type", content = "details")]
pub enum AssistError {
    /// 配置错误
    #[error("配置错误: {message}")]
    Configuration { message: String },

    /// 数据库错误
    #[error("数据库错误: {message}")]
    Database { message: String, code: Option<String> },

    /// LLM 服务错误
    #[error("LLM 服务错误: {message}")]
    Llm { message: String, model: Option<String> },

    /// 认证错误
    #[error("认证错误: {message}")]
    Authentication { message: String },

    /// 授权错误
    #[error("授权错误: {message}")]
    Authorization { message: String },

    /// 验证错误
    #[error("验证错误: {field} - {message}")]
    Validation { field: String, message: String },

    /// 资源未找到
    #[error("资源未找到: {resource}")]
    NotFound { resource: String },

    /// 资源冲突
    #[error("资源冲突: {message}")]
    Conflict { message: String },

    /// 文件处理错误
    #[error("文件处理错误: {message}")]
    FileProcessing { message: String, file_name: Option<String> },

    /// 存储错误（知识库目录、Blob 存储）
    #[error("存储错误: {message}")]
    Storage { message: String },

    /// 外部服务错误
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// 内部服务器错误
    #[error("内部服务器错误: {message}")]
    Internal { message: String },

    /// 服务不可用
    #[error("服务暂时不可用: {message}")]
    ServiceUnavailable { message: String },

    /// 超时错误
    #[error("请求超时: {operation}")]
    Timeout { operation: String },
}

impl AssistError {
    /// 获取错误代码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Llm { .. } => "LLM_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::FileProcessing { .. } => "FILE_PROCESSING_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT_ERROR",
        }
    }

    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Configuration { .. } => 500,
            Self::Database { .. } => 500,
            Self::Llm { .. } => 502,
            Self::Authentication { .. } => 401,
            Self::Authorization { .. } => 403,
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::FileProcessing { .. } => 400,
            Self::Storage { .. } => 500,
            Self::ExternalService { .. } => 502,
            Self::Internal { .. } => 500,
            Self::ServiceUnavailable { .. } => 503,
            Self::Timeout { .. } => 408,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), 400..=499)
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.status_code(), 500..=599)
    }

    /// 是否应该记录错误日志
    pub fn should_log(&self) -> bool {
        !matches!(
            self,
            Self::Validation { .. } | Self::NotFound { .. } | Self::Authentication { .. }
        )
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: None,
        }
    }

    pub fn database_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            model: None,
        }
    }

    pub fn llm_with_model(message: impl Into<String>, model: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            model: Some(model.into()),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn file_processing(message: impl Into<String>) -> Self {
        Self::FileProcessing {
            message: message.into(),
            file_name: None,
        }
    }

    pub fn file_processing_with_name(
        message: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self::FileProcessing {
            message: message.into(),
            file_name: Some(file_name.into()),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}

/// 实现 ResponseError trait 以便与 Actix Web 集成
impl ResponseError for AssistError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(AssistError::status_code(self))
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        if self.should_log() {
            error!(
                error_code = %self.error_code(),
                error_message = %self,
                "处理请求时发生错误"
            );
        }

        crate::errors::ErrorResponse::from_error(self).into_http_response()
    }
}

/// 从 CommonError 转换
impl From<CommonError> for AssistError {
    fn from(err: CommonError) -> Self {
        match err.code.as_str() {
            "VALIDATION_ERROR" => Self::validation("general", err.message),
            "NOT_FOUND" => Self::not_found(err.message),
            "CONFIGURATION_ERROR" => Self::configuration(err.message),
            _ => Self::internal(err.message),
        }
    }
}

/// 从 sea_orm::DbErr 转换
impl From<sea_orm::DbErr> for AssistError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::ConnectionAcquire(_) => Self::database("无法获取数据库连接"),
            sea_orm::DbErr::TryIntoErr { .. } => Self::database("数据类型转换错误"),
            sea_orm::DbErr::Conn(msg) => Self::database(format!("数据库连接错误: {}", msg)),
            sea_orm::DbErr::Exec(msg) => Self::database(format!("数据库执行错误: {}", msg)),
            sea_orm::DbErr::Query(msg) => Self::database(format!("数据库查询错误: {}", msg)),
            sea_orm::DbErr::RecordNotFound(what) => Self::not_found(what),
            _ => Self::database(format!("数据库错误: {}", err)),
        }
    }
}

impl From<config::ConfigError> for AssistError {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(format!("配置加载错误: {}", err))
    }
}

impl From<std::io::Error> for AssistError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found("文件或目录"),
            std::io::ErrorKind::PermissionDenied => Self::authorization("文件访问权限不足"),
            std::io::ErrorKind::TimedOut => Self::timeout("文件操作"),
            _ => Self::storage(format!("IO 错误: {}", err)),
        }
    }
}

impl From<serde_json::Error> for AssistError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation("json", format!("JSON 解析错误: {}", err))
    }
}

impl From<uuid::Error> for AssistError {
    fn from(err: uuid::Error) -> Self {
        Self::validation("uuid", format!("UUID 格式错误: {}", err))
    }
}

impl From<reqwest::Error> for AssistError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("外部 HTTP 请求")
        } else {
            Self::external_service("http", err.to_string())
        }
    }
}

impl From<bcrypt::BcryptError> for AssistError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal(format!("密码哈希处理失败: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AssistError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::authentication("令牌已过期"),
            ErrorKind::InvalidToken | ErrorKind::InvalidSignature => {
                Self::authentication("无效的令牌")
            }
            _ => Self::authentication(format!("令牌处理失败: {}", err)),
        }
    }
}

/// 模块内统一使用的 Result 别名
pub type AssistResult<T> = Result<T, AssistError>;
