// 配置验证器
// 提供详细的配置验证逻辑

use crate::config::{
    AiConfig, AppConfig, AuditConfig, BlobConfig, DatabaseConfig, EnvironmentConfig,
    LoggingConfig, SecurityConfig, ServerConfig, StorageConfig,
};
use emergency_assist_common::CommonError;
use std::path::Path;
use url::Url;

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证完整配置，收集所有模块的错误
    pub fn validate_all(config: &AppConfig) -> Result<(), Vec<CommonError>> {
        let results = [
            Self::validate_server(&config.server),
            Self::validate_database(&config.database),
            Self::validate_ai(&config.ai),
            Self::validate_security(&config.security),
            Self::validate_storage(&config.storage),
            Self::validate_logging(&config.logging),
            Self::validate_audit(&config.audit),
            Self::validate_blob(&config.blob),
            Self::validate_environment(&config.environment),
        ];

        let errors: Vec<CommonError> = results.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 验证服务器配置
    pub fn validate_server(config: &ServerConfig) -> Result<(), CommonError> {
        if config.port == 0 {
            return Err(CommonError::validation("服务器端口不能为 0"));
        }

        if config.host.is_empty() {
            return Err(CommonError::validation("服务器主机地址不能为空"));
        }

        if let Some(workers) = config.workers {
            if workers == 0 {
                return Err(CommonError::validation("工作线程数不能为 0"));
            }
            if workers > 32 {
                return Err(CommonError::validation("工作线程数不建议超过 32"));
            }
        }

        Ok(())
    }

    /// 验证数据库配置
    pub fn validate_database(config: &DatabaseConfig) -> Result<(), CommonError> {
        if config.url.is_empty() {
            return Err(CommonError::validation("数据库 URL 不能为空"));
        }

        if Url::parse(&config.url).is_err() {
            return Err(CommonError::validation("数据库 URL 格式无效"));
        }

        if config.max_connections == 0 {
            return Err(CommonError::validation("数据库最大连接数不能为 0"));
        }

        if config.min_connections > config.max_connections {
            return Err(CommonError::validation("数据库最小连接数不能大于最大连接数"));
        }

        if config.connect_timeout == 0 {
            return Err(CommonError::validation("数据库连接超时不能为 0"));
        }

        Ok(())
    }

    /// 验证 LLM 配置；未设置 api_key 时问答服务走降级路径，不视为错误
    pub fn validate_ai(config: &AiConfig) -> Result<(), CommonError> {
        if Url::parse(&config.endpoint).is_err() {
            return Err(CommonError::validation("LLM 端点 URL 格式无效"));
        }

        if config.model.trim().is_empty() {
            return Err(CommonError::validation("LLM 模型名称不能为空"));
        }

        if config.max_tokens == 0 {
            return Err(CommonError::validation("LLM 最大 token 数不能为 0"));
        }

        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(CommonError::validation("LLM 温度参数必须在 0.0-2.0 之间"));
        }

        if config.timeout == 0 {
            return Err(CommonError::validation("LLM 请求超时不能为 0"));
        }

        Ok(())
    }

    /// 验证安全配置
    pub fn validate_security(config: &SecurityConfig) -> Result<(), CommonError> {
        if config.jwt_secret.len() < 32 {
            return Err(CommonError::validation("JWT 密钥长度不能少于 32 个字符"));
        }

        if config.jwt_expiration == 0 {
            return Err(CommonError::validation("JWT 过期时间不能为 0"));
        }

        if config.jwt_expiration > 86400 * 30 {
            return Err(CommonError::validation("JWT 过期时间不建议超过 30 天"));
        }

        if !(4..=31).contains(&config.bcrypt_cost) {
            return Err(CommonError::validation("bcrypt 成本参数必须在 4-31 之间"));
        }

        Ok(())
    }

    /// 验证存储配置
    pub fn validate_storage(config: &StorageConfig) -> Result<(), CommonError> {
        if config.knowledge_base_path.trim().is_empty() {
            return Err(CommonError::validation("知识库目录不能为空"));
        }

        let valid_backends = ["file", "database"];
        if !valid_backends.contains(&config.flow_backend.as_str()) {
            return Err(CommonError::validation(format!(
                "无效的流程存储后端: {}，有效值: {:?}",
                config.flow_backend, valid_backends
            )));
        }

        if config.max_upload_bytes == 0 {
            return Err(CommonError::validation("最大上传大小不能为 0"));
        }

        if config.max_upload_bytes > 100 * 1024 * 1024 {
            return Err(CommonError::validation("最大上传大小不建议超过 100MB"));
        }

        if config.allowed_image_extensions.is_empty() {
            return Err(CommonError::validation("允许的图片扩展名列表不能为空"));
        }

        if config.log_backup_retention_months == 0 {
            return Err(CommonError::validation("日志备份保留月数不能为 0"));
        }

        Ok(())
    }

    /// 验证日志配置
    pub fn validate_logging(config: &LoggingConfig) -> Result<(), CommonError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.level.as_str()) {
            return Err(CommonError::validation(format!(
                "无效的日志级别: {}，有效值: {:?}",
                config.level, valid_levels
            )));
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&config.format.as_str()) {
            return Err(CommonError::validation(format!(
                "无效的日志格式: {}，有效值: {:?}",
                config.format, valid_formats
            )));
        }

        if config.file_enabled {
            match config.file_path.as_deref() {
                Some(path) if !path.trim().is_empty() => {
                    let log_dir = Path::new(path).parent().unwrap_or(Path::new("."));
                    if !log_dir.as_os_str().is_empty() && !log_dir.exists() {
                        std::fs::create_dir_all(log_dir).map_err(|e| {
                            CommonError::validation(format!("无法创建日志目录: {}", e))
                        })?;
                    }
                }
                _ => {
                    return Err(CommonError::validation("启用文件日志时必须指定日志文件路径"));
                }
            }
        }

        Ok(())
    }

    /// 验证审计日志配置
    pub fn validate_audit(config: &AuditConfig) -> Result<(), CommonError> {
        if config.log_dir.trim().is_empty() {
            return Err(CommonError::validation("审计日志目录不能为空"));
        }

        if config.flush_interval_ms == 0 {
            return Err(CommonError::validation("审计日志刷新间隔不能为 0"));
        }

        if config.rotation_enabled {
            if config.rotate_max_bytes == 0 {
                return Err(CommonError::validation("审计日志轮转阈值不能为 0"));
            }
            if config.rotate_interval_secs == 0 {
                return Err(CommonError::validation("审计日志轮转检查间隔不能为 0"));
            }
        }

        if config.container.trim().is_empty() {
            return Err(CommonError::validation("审计日志上传容器名不能为空"));
        }

        Ok(())
    }

    /// 验证 Blob 存储配置
    pub fn validate_blob(config: &BlobConfig) -> Result<(), CommonError> {
        if let Some(url) = config.account_url.as_deref().filter(|u| !u.trim().is_empty()) {
            if Url::parse(url).is_err() {
                return Err(CommonError::validation("Blob 存储账户 URL 格式无效"));
            }
        }

        if config.upload_retries == 0 {
            return Err(CommonError::validation("Blob 上传尝试次数不能为 0"));
        }

        Ok(())
    }

    /// 验证环境配置
    pub fn validate_environment(config: &EnvironmentConfig) -> Result<(), CommonError> {
        let valid_environments = ["development", "staging", "production", "test"];
        if !valid_environments.contains(&config.name.as_str()) {
            return Err(CommonError::validation(format!(
                "无效的环境名称: {}，有效值: {:?}",
                config.name, valid_environments
            )));
        }

        if config.version.is_empty() {
            return Err(CommonError::validation("版本信息不能为空"));
        }

        Ok(())
    }
}
