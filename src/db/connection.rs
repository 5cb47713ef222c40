// 数据库连接管理
// 处理数据库连接池和连接配置

use crate::config::DatabaseConfig;
use crate::errors::AssistError;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// 数据库连接管理器
///
/// 连接池通过 `web::Data<DatabaseConnection>` 注入到处理器中，
/// 这里只负责建立连接和提供检查工具。
pub struct DatabaseManager {
    connection: DatabaseConnection,
    config: DatabaseConfig,
}

impl DatabaseManager {
    /// 建立数据库连接池并执行一次健康检查
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AssistError> {
        let mut opt = ConnectOptions::new(config.url.clone());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .max_lifetime(Duration::from_secs(config.max_lifetime))
            .sqlx_logging(true)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        info!(
            url = %Self::mask_password(&config.url),
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "连接数据库"
        );

        let connection = Database::connect(opt)
            .await
            .map_err(|e| AssistError::database(format!("数据库连接失败: {}", e)))?;

        let manager = Self {
            connection,
            config: config.clone(),
        };
        manager.health_check().await?;

        info!("数据库连接初始化完成");
        Ok(manager)
    }

    /// 获取连接池句柄（内部为 Arc，可廉价克隆）
    pub fn connection(&self) -> DatabaseConnection {
        self.connection.clone()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AssistError> {
        Self::ping(&self.connection).await.map(|_| ())
    }

    /// 执行 `SELECT 1` 并返回耗时（毫秒）
    pub async fn ping(db: &DatabaseConnection) -> Result<u64, AssistError> {
        let start = Instant::now();
        db.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .map_err(|e| {
            error!(error = %e, "数据库健康检查失败");
            AssistError::database(format!("数据库健康检查失败: {}", e))
        })?;
        Ok(start.elapsed().as_millis() as u64)
    }

    /// 查询数据库版本
    pub async fn version(db: &DatabaseConnection) -> Result<String, AssistError> {
        let row = db
            .query_one(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT version() AS version".to_string(),
            ))
            .await?
            .ok_or_else(|| AssistError::database("无法获取数据库版本"))?;

        row.try_get("", "version")
            .map_err(|e| AssistError::database(format!("解析版本信息失败: {}", e)))
    }

    /// 关闭数据库连接
    #[instrument(skip(self))]
    pub async fn close(self) -> Result<(), AssistError> {
        self.connection
            .close()
            .await
            .map_err(|e| AssistError::database(format!("关闭数据库连接失败: {}", e)))?;
        info!("数据库连接已关闭");
        Ok(())
    }

    /// 屏蔽密码信息用于日志记录
    pub fn mask_password(url: &str) -> String {
        match url::Url::parse(url) {
            Ok(mut parsed_url) => {
                if parsed_url.password().is_some() {
                    let _ = parsed_url.set_password(Some("***"));
                }
                parsed_url.to_string()
            }
            Err(_) => "***".to_string(),
        }
    }
}
