// 认证服务
// 处理登录、令牌签发和用户管理

use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::middleware::auth::JwtUtils;
use crate::config::SecurityConfig;
use crate::db::entities::user::{self, UserRole};
use crate::db::repositories::{NewUser, UserRepository};
use crate::errors::{AssistError, AssistResult};

/// 登录请求
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 登录响应
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserInfo,
    /// HS256 访问令牌
    pub token: String,
}

/// 注册请求（仅管理员）
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    /// 默认 employee
    pub role: Option<String>,
    pub department: Option<String>,
    pub description: Option<String>,
}

/// 用户信息
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserInfo {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            display_name: model.display_name,
            role: model.role.as_str().to_string(),
            department: model.department,
            description: model.description,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

fn required(value: Option<String>, field: &str, message: &str) -> AssistResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AssistError::validation(field, message))
}

/// 认证服务
pub struct AuthService {
    db: DatabaseConnection,
    jwt_secret: String,
    jwt_expiration: u64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, security: &SecurityConfig) -> Self {
        Self {
            db,
            jwt_secret: security.jwt_secret.clone(),
            jwt_expiration: security.jwt_expiration,
            bcrypt_cost: security.bcrypt_cost,
        }
    }

    /// 用户登录
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> AssistResult<LoginResponse> {
        let username = request
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let password = request.password.filter(|p| !p.is_empty());
        let (Some(username), Some(password)) = (username, password) else {
            return Err(AssistError::validation("username", "用户名和密码不能为空"));
        };

        let Some(user) = UserRepository::find_by_username(&self.db, &username).await? else {
            warn!(username = %username, "登录失败：用户不存在");
            return Err(AssistError::authentication("invalid credentials"));
        };

        if let Err(e) = check_password(&password, &user.password_hash) {
            warn!(username = %username, "登录失败：密码错误");
            return Err(e);
        }

        let token = JwtUtils::generate_token(
            user.id,
            &user.username,
            user.role.as_str(),
            &self.jwt_secret,
            self.jwt_expiration,
        )?;

        info!(user_id = %user.id, "用户登录成功");
        Ok(LoginResponse {
            success: true,
            user: user.into(),
            token,
        })
    }

    /// 令牌对应的用户
    #[instrument(skip(self))]
    pub async fn current_user(&self, user_id: Uuid) -> AssistResult<UserInfo> {
        UserRepository::find_by_id(&self.db, user_id)
            .await?
            .map(UserInfo::from)
            .ok_or_else(|| AssistError::authentication("用户不存在"))
    }

    /// 创建用户
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> AssistResult<UserInfo> {
        let username = required(request.username, "username", "用户名不能为空")?;
        let password = required(request.password, "password", "密码不能为空")?;
        let display_name = required(request.display_name, "displayName", "显示名称不能为空")?;
        let role = match request.role.as_deref() {
            None | Some("") => UserRole::Employee,
            Some(role) => UserRole::parse(role)
                .ok_or_else(|| AssistError::validation("role", format!("未知的角色: {}", role)))?,
        };

        if UserRepository::exists_by_username(&self.db, &username).await? {
            return Err(AssistError::conflict(format!("用户名 '{}' 已存在", username)));
        }

        let password_hash = hash(&password, self.bcrypt_cost)?;
        let created = UserRepository::create(
            &self.db,
            NewUser {
                username,
                password_hash,
                display_name,
                role,
                department: request.department,
                description: request.description,
            },
        )
        .await?;

        info!(user_id = %created.id, role = created.role.as_str(), "用户已创建");
        Ok(created.into())
    }

    pub async fn list_users(&self) -> AssistResult<Vec<UserInfo>> {
        Ok(UserRepository::list(&self.db)
            .await?
            .into_iter()
            .map(UserInfo::from)
            .collect())
    }

    /// 管理员不能删除自己
    #[instrument(skip(self))]
    pub async fn delete_user(&self, actor_id: Uuid, user_id: Uuid) -> AssistResult<()> {
        if actor_id == user_id {
            return Err(AssistError::validation("id", "不能删除当前登录的用户"));
        }
        if !UserRepository::delete(&self.db, user_id).await? {
            return Err(AssistError::not_found(format!("用户 {}", user_id)));
        }
        Ok(())
    }
}

/// 校验密码；哈希格式损坏与密码不符同样视为认证失败
fn check_password(password: &str, password_hash: &str) -> AssistResult<()> {
    match verify(password, password_hash) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AssistError::authentication("invalid credentials")),
        Err(e) => {
            warn!(error = %e, "密码哈希无法解析");
            Err(AssistError::authentication("invalid credentials"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security() -> SecurityConfig {
        SecurityConfig {
            jwt_secret: "unit-test-secret-key-with-32-chars-min".to_string(),
            jwt_expiration: 3600,
            bcrypt_cost: 4,
            cors_origins: vec![],
        }
    }

    fn service() -> AuthService {
        // 这些用例在访问数据库之前就返回
        AuthService::new(DatabaseConnection::Disconnected, &security())
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let result = service()
            .login(LoginRequest {
                username: Some("  ".to_string()),
                password: Some("x".to_string()),
            })
            .await;
        assert!(matches!(result, Err(AssistError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_register_requires_display_name() {
        let result = service()
            .register(RegisterRequest {
                username: Some("yamada".to_string()),
                password: Some("pw".to_string()),
                display_name: None,
                role: None,
                department: None,
                description: None,
            })
            .await;
        assert!(
            matches!(result, Err(AssistError::Validation { field, .. }) if field == "displayName")
        );
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let id = Uuid::new_v4();
        let result = service().delete_user(id, id).await;
        assert!(matches!(result, Err(AssistError::Validation { .. })));
    }

    #[test]
    fn test_check_password() {
        let hashed = hash("secret", 4).unwrap();
        assert!(check_password("secret", &hashed).is_ok());

        let wrong = check_password("other", &hashed).unwrap_err();
        assert!(matches!(wrong, AssistError::Authentication { .. }));
        assert_eq!(wrong.status_code(), 401);

        // 损坏的哈希不是服务器错误
        let malformed = check_password("secret", "not-a-bcrypt-hash").unwrap_err();
        assert!(matches!(malformed, AssistError::Authentication { .. }));
        assert_eq!(malformed.status_code(), 401);
    }
}
