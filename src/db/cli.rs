// 数据库管理 CLI 工具
// 提供迁移、管理员初始化和密码重置等命令行功能

use crate::config::AppConfig;
use crate::db::connection::DatabaseManager;
use crate::db::migrations::{MigrationManager, SeedDataManager};
use crate::errors::AssistError;

/// CLI 命令
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Migration(MigrationCommand),
    Seed(SeedCommand),
    User(UserCommand),
}

/// 迁移命令
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationCommand {
    Status,
    Migrate,
    Rollback { version: String },
    Validate,
}

/// 种子数据命令
#[derive(Debug, Clone, PartialEq)]
pub enum SeedCommand {
    Admin {
        username: String,
        password: String,
        display_name: String,
    },
}

/// 用户维护命令
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    ResetPassword { username: String, password: String },
}

/// CLI 执行器
pub struct CliExecutor {
    manager: DatabaseManager,
    bcrypt_cost: u32,
}

impl CliExecutor {
    pub async fn new(config: AppConfig) -> Result<Self, AssistError> {
        let manager = DatabaseManager::connect(&config.database).await?;
        Ok(Self {
            manager,
            bcrypt_cost: config.security.bcrypt_cost,
        })
    }

    pub async fn execute(&self, command: CliCommand) -> Result<(), AssistError> {
        match command {
            CliCommand::Migration(cmd) => self.execute_migration_command(cmd).await,
            CliCommand::Seed(cmd) => self.execute_seed_command(cmd).await,
            CliCommand::User(cmd) => self.execute_user_command(cmd).await,
        }
    }

    async fn execute_migration_command(
        &self,
        command: MigrationCommand,
    ) -> Result<(), AssistError> {
        let manager = MigrationManager::new(self.manager.connection());

        match command {
            MigrationCommand::Status => {
                manager.init().await?;
                let status = manager.check_status().await?;
                println!("📊 迁移状态:");
                println!("{:<20} {:<32} {:<10} {:<25}", "版本", "名称", "状态", "应用时间");
                println!("{}", "-".repeat(87));
                for item in status {
                    let state = match (item.is_applied, item.checksum_mismatch) {
                        (true, true) => "已修改",
                        (true, false) => "已应用",
                        (false, _) => "待应用",
                    };
                    let applied_at = item
                        .applied_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<20} {:<32} {:<10} {:<25}",
                        item.version, item.name, state, applied_at
                    );
                }
            }
            MigrationCommand::Migrate => {
                let applied = manager.migrate().await?;
                if applied.is_empty() {
                    println!("✅ 没有待应用的迁移");
                } else {
                    println!("✅ 成功应用 {} 个迁移:", applied.len());
                    for version in applied {
                        println!("  - {}", version);
                    }
                }
            }
            MigrationCommand::Rollback { version } => {
                manager.rollback(&version).await?;
                println!("✅ 迁移 {} 回滚完成", version);
            }
            MigrationCommand::Validate => {
                let validation = manager.validate_schema().await?;
                if validation.is_valid {
                    println!("✅ 数据库架构验证通过");
                } else {
                    println!("❌ 数据库架构验证失败，缺失的表:");
                    for table in &validation.missing_tables {
                        println!("  - {}", table);
                    }
                }
            }
        }

        Ok(())
    }

    async fn execute_seed_command(&self, command: SeedCommand) -> Result<(), AssistError> {
        let seeder = SeedDataManager::new(self.manager.connection(), self.bcrypt_cost);
        match command {
            SeedCommand::Admin {
                username,
                password,
                display_name,
            } => {
                let id = seeder.seed_admin(&username, &password, &display_name).await?;
                println!("✅ 管理员 {} 创建完成 (ID: {})", username, id);
            }
        }
        Ok(())
    }

    async fn execute_user_command(&self, command: UserCommand) -> Result<(), AssistError> {
        let seeder = SeedDataManager::new(self.manager.connection(), self.bcrypt_cost);
        match command {
            UserCommand::ResetPassword { username, password } => {
                seeder.reset_password(&username, &password).await?;
                println!("✅ 用户 {} 的密码已重置", username);
            }
        }
        Ok(())
    }
}

/// 解析命令行参数（args[0] 为程序名）
pub fn parse_args(args: &[String]) -> Result<CliCommand, AssistError> {
    let arg = |i: usize, field: &str, message: &str| {
        args.get(i)
            .cloned()
            .ok_or_else(|| AssistError::validation(field, message))
    };

    match arg(1, "args", "请提供命令")?.as_str() {
        "migration" | "migrate" => {
            let subcommand = match arg(2, "migration", "请提供迁移子命令")?.as_str() {
                "status" => MigrationCommand::Status,
                "up" | "migrate" => MigrationCommand::Migrate,
                "rollback" | "down" => MigrationCommand::Rollback {
                    version: arg(3, "version", "请提供要回滚的版本")?,
                },
                "validate" => MigrationCommand::Validate,
                _ => return Err(AssistError::validation("migration", "未知的迁移子命令")),
            };
            Ok(CliCommand::Migration(subcommand))
        }
        "seed" => match arg(2, "seed", "请提供种子数据子命令")?.as_str() {
            "admin" => {
                let username = arg(3, "username", "请提供管理员用户名")?;
                let password = arg(4, "password", "请提供管理员密码")?;
                let display_name = args.get(5).cloned().unwrap_or_else(|| "管理者".to_string());
                Ok(CliCommand::Seed(SeedCommand::Admin {
                    username,
                    password,
                    display_name,
                }))
            }
            _ => Err(AssistError::validation("seed", "未知的种子数据子命令")),
        },
        "user" => match arg(2, "user", "请提供用户子命令")?.as_str() {
            "reset-password" => Ok(CliCommand::User(UserCommand::ResetPassword {
                username: arg(3, "username", "请提供用户名")?,
                password: arg(4, "password", "请提供新密码")?,
            })),
            _ => Err(AssistError::validation("user", "未知的用户子命令")),
        },
        _ => Err(AssistError::validation("args", "未知的命令")),
    }
}

pub fn print_help() {
    println!("Emergency Assist 数据库管理工具");
    println!();
    println!("用法:");
    println!("  emergency-assist-db <命令> <子命令> [参数]");
    println!();
    println!("迁移命令:");
    println!("  migrate status                 检查迁移状态");
    println!("  migrate up                     应用待处理的迁移");
    println!("  migrate rollback <version>     回滚指定版本的迁移");
    println!("  migrate validate               验证数据库架构");
    println!();
    println!("种子数据命令:");
    println!("  seed admin <用户名> <密码> [显示名]   创建管理员账号");
    println!();
    println!("用户命令:");
    println!("  user reset-password <用户名> <新密码>  重置密码");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        std::iter::once("emergency-assist-db")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_migration_commands() {
        assert_eq!(
            parse_args(&args(&["migrate", "up"])).unwrap(),
            CliCommand::Migration(MigrationCommand::Migrate)
        );
        assert_eq!(
            parse_args(&args(&["migration", "rollback", "20240601_000002"])).unwrap(),
            CliCommand::Migration(MigrationCommand::Rollback {
                version: "20240601_000002".to_string()
            })
        );
        assert!(parse_args(&args(&["migrate", "rollback"])).is_err());
    }

    #[test]
    fn test_parse_seed_admin_defaults_display_name() {
        let command = parse_args(&args(&["seed", "admin", "root", "secret"])).unwrap();
        assert_eq!(
            command,
            CliCommand::Seed(SeedCommand::Admin {
                username: "root".to_string(),
                password: "secret".to_string(),
                display_name: "管理者".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_reset_password() {
        let command = parse_args(&args(&["user", "reset-password", "niina", "pw"])).unwrap();
        assert!(matches!(command, CliCommand::User(UserCommand::ResetPassword { .. })));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(parse_args(&args(&["backup", "create"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }
}
