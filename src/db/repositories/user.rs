// 用户仓储实现

use crate::db::entities::{prelude::*, user};
use crate::errors::AssistError;
use sea_orm::{prelude::*, *};
use tracing::{info, instrument};
use uuid::Uuid;

/// 新建用户所需字段
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: UserRole,
    pub department: Option<String>,
    pub description: Option<String>,
}

/// 用户仓储
pub struct UserRepository;

impl UserRepository {
    /// 创建新用户，用户名重复时返回冲突错误
    #[instrument(skip(db, new_user), fields(username = %new_user.username))]
    pub async fn create(
        db: &DatabaseConnection,
        new_user: NewUser,
    ) -> Result<user::Model, AssistError> {
        if Self::exists_by_username(db, &new_user.username).await? {
            return Err(AssistError::conflict(format!(
                "用户名 '{}' 已存在",
                new_user.username
            )));
        }

        let now = chrono::Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(new_user.username),
            password_hash: Set(new_user.password_hash),
            display_name: Set(new_user.display_name),
            role: Set(new_user.role),
            department: Set(new_user.department),
            description: Set(new_user.description),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let result = model.insert(db).await?;
        info!(user_id = %result.id, "用户创建成功");
        Ok(result)
    }

    #[instrument(skip(db))]
    pub async fn find_by_id(
        db: &DatabaseConnection,
        id: Uuid,
    ) -> Result<Option<user::Model>, AssistError> {
        Ok(User::find_by_id(id).one(db).await?)
    }

    #[instrument(skip(db))]
    pub async fn find_by_username(
        db: &DatabaseConnection,
        username: &str,
    ) -> Result<Option<user::Model>, AssistError> {
        Ok(User::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await?)
    }

    #[instrument(skip(db))]
    pub async fn exists_by_username(
        db: &DatabaseConnection,
        username: &str,
    ) -> Result<bool, AssistError> {
        let count = User::find()
            .filter(user::Column::Username.eq(username))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    /// 按创建时间列出全部用户
    #[instrument(skip(db))]
    pub async fn list(db: &DatabaseConnection) -> Result<Vec<user::Model>, AssistError> {
        Ok(User::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// 更新密码哈希
    #[instrument(skip(db, password_hash))]
    pub async fn update_password(
        db: &DatabaseConnection,
        id: Uuid,
        password_hash: String,
    ) -> Result<user::Model, AssistError> {
        let existing = Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| AssistError::not_found("用户"))?;

        let mut model: user::ActiveModel = existing.into();
        model.password_hash = Set(password_hash);
        model.updated_at = Set(chrono::Utc::now().into());

        let result = model.update(db).await?;
        info!(user_id = %id, "用户密码已更新");
        Ok(result)
    }

    /// 删除用户，返回是否真的删除了记录
    #[instrument(skip(db))]
    pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<bool, AssistError> {
        let result = User::delete_by_id(id).exec(db).await?;
        if result.rows_affected > 0 {
            info!(user_id = %id, "用户已删除");
        }
        Ok(result.rows_affected > 0)
    }
}
