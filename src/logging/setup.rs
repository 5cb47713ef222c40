// 日志系统设置

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 日志系统初始化器
pub struct LoggingSetup;

impl LoggingSetup {
    /// 初始化日志系统
    ///
    /// 返回的 guard 必须在进程生命周期内持有，否则文件日志会丢失尾部内容。
    pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
        let env_filter = Self::env_filter(&config.level);

        let mut layers: Vec<BoxedLayer> = vec![Self::stdout_layer(&config.format)];

        let guard = match Self::file_writer(config)? {
            Some((writer, guard)) => {
                layers.push(
                    fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_target(true)
                        .with_writer(writer)
                        .boxed(),
                );
                Some(guard)
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()
            .context("无法设置全局日志订阅器")?;

        tracing::info!(level = %config.level, format = %config.format, "日志系统初始化完成");
        if config.file_enabled {
            tracing::info!("文件日志已启用: {:?}", config.file_path);
        }

        Ok(guard)
    }

    /// RUST_LOG 优先于配置中的级别
    pub fn env_filter(level: &str) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn stdout_layer(format: &str) -> BoxedLayer {
        match format {
            "json" => fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            "pretty" => fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            _ => fmt::layer().compact().with_target(true).boxed(),
        }
    }

    /// 按天滚动的非阻塞文件输出
    fn file_writer(
        config: &LoggingConfig,
    ) -> Result<Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)>> {
        if !config.file_enabled {
            return Ok(None);
        }

        let path = config
            .file_path
            .as_deref()
            .context("启用文件日志时必须指定日志文件路径")?;
        let path = Path::new(path);
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .context("日志文件路径缺少文件名")?;

        std::fs::create_dir_all(directory)
            .with_context(|| format!("无法创建日志目录 {}", directory.display()))?;

        let appender = tracing_appender::rolling::daily(directory, file_name);
        Ok(Some(tracing_appender::non_blocking(appender)))
    }

    /// 命令行工具使用的精简配置
    pub fn cli_config() -> LoggingConfig {
        LoggingConfig {
            level: "info".to_string(),
            format: "compact".to_string(),
            file_enabled: false,
            file_path: None,
        }
    }
}
