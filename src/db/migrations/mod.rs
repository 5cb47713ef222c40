// 数据库迁移模块
// 包含迁移脚本和管理功能

use crate::errors::AssistError;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, Statement, TransactionTrait, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

pub mod migrations;
pub mod seed_data;

pub use migrations::*;
pub use seed_data::*;

/// 迁移信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    pub version: String,
    pub name: String,
    pub description: String,
    pub up_sql: String,
    pub down_sql: String,
}

impl Migration {
    /// 迁移内容的 SHA-256 校验和
    pub fn checksum(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.up_sql.as_bytes());
        hasher.update(self.down_sql.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// 迁移状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub applied_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_applied: bool,
    pub checksum: String,
    pub checksum_mismatch: bool,
}

/// 架构验证结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaValidation {
    pub is_valid: bool,
    pub missing_tables: Vec<String>,
}

/// 迁移管理器
pub struct MigrationManager {
    db: DatabaseConnection,
}

impl MigrationManager {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 创建迁移记录表
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<(), AssistError> {
        self.execute_sql(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version VARCHAR(255) PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                description TEXT,
                checksum VARCHAR(64) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                execution_time_ms INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .await?;

        info!("迁移系统初始化完成");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_applied_migrations(&self) -> Result<Vec<MigrationStatus>, AssistError> {
        let rows = self
            .db
            .query_all(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT version, name, applied_at, checksum FROM schema_migrations ORDER BY version"
                    .to_string(),
            ))
            .await?;

        let mut migrations = Vec::with_capacity(rows.len());
        for row in rows {
            migrations.push(MigrationStatus {
                version: row.try_get("", "version")?,
                name: row.try_get("", "name")?,
                applied_at: Some(row.try_get("", "applied_at")?),
                is_applied: true,
                checksum: row.try_get("", "checksum")?,
                checksum_mismatch: false,
            });
        }

        Ok(migrations)
    }

    /// 对比已应用的迁移和代码中的迁移
    #[instrument(skip(self))]
    pub async fn check_status(&self) -> Result<Vec<MigrationStatus>, AssistError> {
        let applied: HashMap<String, MigrationStatus> = self
            .get_applied_migrations()
            .await?
            .into_iter()
            .map(|m| (m.version.clone(), m))
            .collect();

        let status = get_all_migrations()
            .into_iter()
            .map(|migration| {
                let checksum = migration.checksum();
                match applied.get(&migration.version) {
                    Some(record) => {
                        let mismatch = record.checksum != checksum;
                        if mismatch {
                            warn!(version = %migration.version, "迁移校验和不匹配，可能已被修改");
                        }
                        MigrationStatus {
                            checksum_mismatch: mismatch,
                            ..record.clone()
                        }
                    }
                    None => MigrationStatus {
                        version: migration.version,
                        name: migration.name,
                        applied_at: None,
                        is_applied: false,
                        checksum,
                        checksum_mismatch: false,
                    },
                }
            })
            .collect();

        Ok(status)
    }

    /// 按版本顺序应用所有待处理的迁移
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<Vec<String>, AssistError> {
        self.init().await?;

        let pending: Vec<String> = self
            .check_status()
            .await?
            .into_iter()
            .filter(|s| !s.is_applied)
            .map(|s| s.version)
            .collect();

        let mut applied = Vec::new();
        for migration in get_all_migrations()
            .into_iter()
            .filter(|m| pending.contains(&m.version))
        {
            self.apply_migration(&migration).await?;
            applied.push(migration.version);
        }

        if applied.is_empty() {
            info!("没有待处理的迁移");
        } else {
            info!(count = applied.len(), "迁移应用完成");
        }

        Ok(applied)
    }

    #[instrument(skip(self, migration), fields(version = %migration.version))]
    async fn apply_migration(&self, migration: &Migration) -> Result<(), AssistError> {
        info!(name = %migration.name, "应用迁移");
        let start_time = std::time::Instant::now();

        let txn = self.db.begin().await?;

        if let Err(e) = Self::execute_sql_in_txn(&txn, &migration.up_sql).await {
            txn.rollback().await?;
            return Err(AssistError::database(format!(
                "迁移 {} 执行失败: {}",
                migration.version, e
            )));
        }

        let execution_time = start_time.elapsed().as_millis() as i32;
        let record = Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "INSERT INTO schema_migrations (version, name, description, checksum, execution_time_ms) \
             VALUES ($1, $2, $3, $4, $5)",
            [
                Value::from(migration.version.clone()),
                Value::from(migration.name.clone()),
                Value::from(migration.description.clone()),
                Value::from(migration.checksum()),
                Value::from(execution_time),
            ],
        );

        if let Err(e) = txn.execute(record).await {
            txn.rollback().await?;
            return Err(AssistError::database(format!(
                "记录迁移 {} 失败: {}",
                migration.version, e
            )));
        }

        txn.commit().await?;
        info!(execution_time_ms = execution_time, "迁移应用成功");
        Ok(())
    }

    /// 回滚指定版本的迁移
    #[instrument(skip(self))]
    pub async fn rollback(&self, version: &str) -> Result<(), AssistError> {
        warn!(version = %version, "回滚数据库迁移");

        let migration = get_all_migrations()
            .into_iter()
            .find(|m| m.version == version)
            .ok_or_else(|| AssistError::not_found(format!("迁移 {}", version)))?;

        let txn = self.db.begin().await?;

        if let Err(e) = Self::execute_sql_in_txn(&txn, &migration.down_sql).await {
            txn.rollback().await?;
            return Err(AssistError::database(format!("迁移 {} 回滚失败: {}", version, e)));
        }

        txn.execute(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "DELETE FROM schema_migrations WHERE version = $1",
            [Value::from(version.to_string())],
        ))
        .await?;

        txn.commit().await?;
        info!(version = %version, "迁移回滚完成");
        Ok(())
    }

    /// 检查必需的表是否存在
    #[instrument(skip(self))]
    pub async fn validate_schema(&self) -> Result<SchemaValidation, AssistError> {
        let mut missing_tables = Vec::new();
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                missing_tables.push(table.to_string());
            }
        }

        let validation = SchemaValidation {
            is_valid: missing_tables.is_empty(),
            missing_tables,
        };

        if validation.is_valid {
            info!("数据库架构验证通过");
        } else {
            warn!(missing = ?validation.missing_tables, "数据库架构验证失败");
        }

        Ok(validation)
    }

    async fn execute_sql(&self, sql: &str) -> Result<(), AssistError> {
        for statement in split_statements(sql) {
            self.db
                .execute(Statement::from_string(
                    sea_orm::DatabaseBackend::Postgres,
                    statement.to_string(),
                ))
                .await?;
        }
        Ok(())
    }

    async fn execute_sql_in_txn(txn: &DatabaseTransaction, sql: &str) -> Result<(), AssistError> {
        for statement in split_statements(sql) {
            txn.execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                statement.to_string(),
            ))
            .await?;
        }
        Ok(())
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, AssistError> {
        let result = self
            .db
            .query_one(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1) AS exists",
                [Value::from(table_name.to_string())],
            ))
            .await?;

        Ok(match result {
            Some(row) => row.try_get("", "exists").unwrap_or(false),
            None => false,
        })
    }
}

/// 按分号拆分迁移脚本；迁移中不使用函数体等包含分号的语句
pub fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_versions_are_sorted_and_unique() {
        let migrations = get_all_migrations();
        let versions: Vec<&str> = migrations.iter().map(|m| m.version.as_str()).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_required_tables_are_created_by_migrations() {
        let all_sql: String = get_all_migrations()
            .iter()
            .map(|m| m.up_sql.clone())
            .collect();
        for table in REQUIRED_TABLES {
            assert!(
                all_sql.contains(&format!("CREATE TABLE {} (", table)),
                "缺少建表语句: {}",
                table
            );
        }
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let mut migration = get_all_migrations().remove(0);
        let original = migration.checksum();
        assert_eq!(original.len(), 64);
        migration.up_sql.push_str("\n-- changed");
        assert_ne!(migration.checksum(), original);
    }

    #[test]
    fn test_split_statements_skips_blanks() {
        let parts: Vec<&str> =
            split_statements("CREATE TABLE a (id INT);\n\n ; SELECT 1;").collect();
        assert_eq!(parts, vec!["CREATE TABLE a (id INT)", "SELECT 1"]);
    }
}
