// 配置加载器
// 处理配置文件加载和环境变量解析

use crate::config::AppConfig;
use config::ConfigError;
use dotenvy::dotenv;
use emergency_assist_common::CommonError;
use std::sync::OnceLock;
use tracing::{info, warn};

/// 全局配置实例
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 初始化配置
    pub fn init() -> Result<&'static AppConfig, CommonError> {
        if let Err(e) = dotenv() {
            warn!("无法加载 .env 文件: {}", e);
        }

        let config = AppConfig::load().map_err(convert_config_error)?;
        config.validate()?;

        CONFIG
            .set(config)
            .map_err(|_| CommonError::internal("配置已经初始化"))?;
        let config = Self::get().ok_or_else(|| CommonError::internal("配置初始化失败"))?;

        info!(
            environment = %config.environment.name,
            version = %config.environment.version,
            "配置加载成功"
        );

        Ok(config)
    }

    /// 获取配置，未初始化时返回 None
    pub fn get() -> Option<&'static AppConfig> {
        CONFIG.get()
    }

    /// 打印配置摘要
    pub fn print_summary(config: &AppConfig) {
        println!("=== Emergency Assist 配置摘要 ===");
        println!("环境: {}", config.environment.name);
        println!("版本: {}", config.environment.version);
        println!("调试模式: {}", config.environment.debug);
        println!("服务器: {}:{}", config.server.host, config.server.port);
        println!("工作线程: {:?}", config.server.workers);
        println!(
            "数据库连接池: {}-{}",
            config.database.min_connections, config.database.max_connections
        );
        println!("LLM 模型: {} ({})", config.ai.model, config.ai.endpoint);
        println!("知识库目录: {}", config.storage.knowledge_base_path);
        println!("流程存储: {}", config.storage.flow_backend);
        println!("审计日志: {}", config.audit.log_file().display());
        println!(
            "Blob 存储: {}",
            if config.blob.is_configured() { "已配置" } else { "未配置" }
        );
        println!("日志级别: {}", config.logging.level);
        println!("================================");
    }
}

/// 配置错误转换辅助函数
pub fn convert_config_error(err: ConfigError) -> CommonError {
    CommonError::configuration(format!("配置错误: {}", err))
}
