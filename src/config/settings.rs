// 应用程序设置和配置
// 定义配置结构体和加载逻辑

use config::{Config, ConfigError, Environment, File};
use emergency_assist_common::CommonError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 应用程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub audit: AuditConfig,
    pub blob: BlobConfig,
    pub environment: EnvironmentConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

/// LLM 服务配置（OpenAI 兼容接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: u64,
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    /// 令牌有效期（秒）
    pub jwt_expiration: u64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub knowledge_base_path: String,
    pub uploads_paths: Vec<String>,
    /// 故障排查流程的存储后端: "file" 或 "database"
    pub flow_backend: String,
    pub max_upload_bytes: u64,
    pub allowed_image_extensions: Vec<String>,
    pub log_backup_retention_months: u32,
}

impl StorageConfig {
    pub fn knowledge_base_dir(&self) -> PathBuf {
        PathBuf::from(&self.knowledge_base_path)
    }

    pub fn uses_database_flows(&self) -> bool {
        self.flow_backend == "database"
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_enabled: bool,
    pub file_path: Option<String>,
}

/// 审计日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub enabled: bool,
    pub log_dir: String,
    pub tag: String,
    pub mask_keys: Vec<String>,
    pub flush_interval_ms: u64,
    pub rotation_enabled: bool,
    pub rotate_max_bytes: u64,
    pub rotate_interval_secs: u64,
    pub compress: bool,
    pub container: String,
    pub path_prefix: Option<String>,
}

impl AuditConfig {
    pub fn log_file(&self) -> PathBuf {
        Path::new(&self.log_dir).join("audit.log")
    }

    /// 上传路径前缀，总是以 `/` 结尾；未配置时 knowledge 容器使用 `userlog/`
    pub fn resolved_path_prefix(&self) -> String {
        let prefix = match &self.path_prefix {
            Some(prefix) => prefix.clone(),
            None if self.container == "knowledge" => "userlog/".to_string(),
            None => String::new(),
        };
        if prefix.is_empty() || prefix.ends_with('/') {
            prefix
        } else {
            format!("{}/", prefix)
        }
    }
}

/// Blob 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    pub account_url: Option<String>,
    pub sas_token: Option<String>,
    pub knowledge_container: String,
    pub upload_retries: u32,
}

impl BlobConfig {
    pub fn is_configured(&self) -> bool {
        self.account_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}

/// 环境配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub debug: bool,
    pub version: String,
}

impl AppConfig {
    /// 从环境变量和配置文件加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::builder();

        // 1. 加载默认配置
        config = config.add_source(Config::try_from(&AppConfig::default())?);

        // 2. 尝试加载配置文件
        if Path::new("config.toml").exists() {
            config = config.add_source(File::with_name("config"));
        }

        // 3. 加载环境变量（优先级最高）
        config = config.add_source(
            Environment::with_prefix("ASSIST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = config.build()?;
        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config.environment.version = env!("CARGO_PKG_VERSION").to_string();

        Ok(app_config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), CommonError> {
        use crate::config::ConfigValidator;

        match ConfigValidator::validate_all(self) {
            Ok(()) => Ok(()),
            Err(errors) => {
                let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                Err(CommonError::configuration(format!(
                    "配置验证失败: {}",
                    error_messages.join("; ")
                )))
            }
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.name == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment.name == "production"
    }

    pub fn is_test(&self) -> bool {
        self.environment.name == "test"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3001,
                workers: None,
                keep_alive: 75,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/emergency_assist".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout: 30,
                idle_timeout: 600,
                max_lifetime: 1800,
            },
            ai: AiConfig {
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4".to_string(),
                temperature: 0.1,
                max_tokens: 2000,
                timeout: 60,
            },
            security: SecurityConfig {
                jwt_secret: "dev-only-emergency-assist-jwt-secret-change-me".to_string(),
                jwt_expiration: 86400,
                bcrypt_cost: 10,
                cors_origins: vec!["*".to_string()],
            },
            storage: StorageConfig {
                knowledge_base_path: "knowledge-base".to_string(),
                uploads_paths: vec!["uploads".to_string(), "public/uploads".to_string()],
                flow_backend: "file".to_string(),
                max_upload_bytes: 5 * 1024 * 1024, // 5MB
                allowed_image_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect(),
                log_backup_retention_months: 6,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
                file_enabled: false,
                file_path: None,
            },
            audit: AuditConfig {
                enabled: true,
                log_dir: "logs".to_string(),
                tag: "api".to_string(),
                mask_keys: vec!["password".to_string(), "token".to_string()],
                flush_interval_ms: 2000,
                rotation_enabled: true,
                rotate_max_bytes: 5_000_000,
                rotate_interval_secs: 300,
                compress: true,
                container: "audit-logs".to_string(),
                path_prefix: None,
            },
            blob: BlobConfig {
                account_url: None,
                sas_token: None,
                knowledge_container: "knowledge".to_string(),
                upload_retries: 3,
            },
            environment: EnvironmentConfig {
                name: "development".to_string(),
                debug: true,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}
