// 种子数据管理
// 初始管理员账号与密码重置

use crate::db::entities::UserRole;
use crate::db::repositories::{NewUser, UserRepository};
use crate::errors::AssistError;
use sea_orm::DatabaseConnection;
use tracing::{info, instrument};

/// 种子数据管理器
pub struct SeedDataManager {
    db: DatabaseConnection,
    bcrypt_cost: u32,
}

impl SeedDataManager {
    pub fn new(db: DatabaseConnection, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    /// 创建管理员账号；已存在同名用户时返回冲突错误
    #[instrument(skip(self, password))]
    pub async fn seed_admin(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
    ) -> Result<uuid::Uuid, AssistError> {
        let password_hash = bcrypt::hash(password, self.bcrypt_cost)?;
        let user = UserRepository::create(
            &self.db,
            NewUser {
                username: username.to_string(),
                password_hash,
                display_name: display_name.to_string(),
                role: UserRole::Admin,
                department: None,
                description: Some("初始管理员".to_string()),
            },
        )
        .await?;

        info!(user_id = %user.id, "管理员账号创建成功");
        Ok(user.id)
    }

    /// 重置指定用户的密码
    #[instrument(skip(self, password))]
    pub async fn reset_password(&self, username: &str, password: &str) -> Result<(), AssistError> {
        let user = UserRepository::find_by_username(&self.db, username)
            .await?
            .ok_or_else(|| AssistError::not_found(format!("用户 {}", username)))?;

        let password_hash = bcrypt::hash(password, self.bcrypt_cost)?;
        UserRepository::update_password(&self.db, user.id, password_hash).await?;
        Ok(())
    }
}
