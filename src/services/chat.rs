// 聊天记录服务
// 会话、消息、附件以及 JSON/CSV 导出

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::middleware::auth::AuthenticatedUser;
use crate::db::entities::{chat, chat_export, media};
use crate::db::repositories::{ChatExportRepository, ChatRepository, MessageWithMedia, NewMedia};
use crate::errors::{AssistError, AssistResult};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<chat::Model> for ChatInfo {
    fn from(model: chat::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    #[serde(default, skip_deserializing)]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<media::Model> for MediaInfo {
    fn from(model: media::Model) -> Self {
        Self {
            id: Some(model.id),
            media_type: model.media_type,
            url: model.url,
            description: model.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub content: String,
    pub is_ai_response: bool,
    pub created_at: DateTime<Utc>,
    pub media: Vec<MediaInfo>,
}

impl From<MessageWithMedia> for MessageInfo {
    fn from(row: MessageWithMedia) -> Self {
        Self {
            id: row.message.id,
            chat_id: row.message.chat_id,
            sender_id: row.message.sender_id,
            content: row.message.content,
            is_ai_response: row.message.is_ai_response,
            created_at: row.message.created_at.with_timezone(&Utc),
            media: row.media.into_iter().map(MediaInfo::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateChatRequest {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub is_ai_response: bool,
    #[serde(default)]
    pub media: Vec<MediaInfo>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportInfo {
    pub chat_id: Uuid,
    pub file_name: String,
    pub exported_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
}

impl From<chat_export::Model> for ExportInfo {
    fn from(model: chat_export::Model) -> Self {
        Self {
            chat_id: model.chat_id,
            file_name: model.file_name,
            exported_at: model.exported_at.with_timezone(&Utc),
            message_count: None,
        }
    }
}

/// CSV 字段转义
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// 会话信息头、空行、消息表
pub fn render_csv(chat: &ChatInfo, messages: &[MessageInfo]) -> String {
    let mut lines = vec![
        format!("会话ID,{}", chat.id),
        format!("标题,{}", csv_field(chat.title.as_deref().unwrap_or_default())),
        format!("创建时间,{}", chat.created_at.to_rfc3339()),
        String::new(),
        "No.,发送者,内容,图片URL,创建时间".to_string(),
    ];

    for (index, message) in messages.iter().enumerate() {
        let sender = if message.is_ai_response { "AI" } else { "用户" };
        let image = message
            .media
            .iter()
            .find(|m| m.media_type == "image")
            .map(|m| m.url.as_str())
            .unwrap_or_default();
        lines.push(format!(
            "{},{},{},{},{}",
            index + 1,
            csv_field(sender),
            csv_field(&message.content),
            csv_field(image),
            csv_field(&message.created_at.to_rfc3339())
        ));
    }
    lines.join("\n")
}

pub fn csv_file_name(chat_id: Uuid, now: DateTime<Utc>) -> String {
    format!("emergency_assistance_{}_{}.csv", chat_id, now.format("%Y-%m-%d"))
}

pub struct ChatService {
    db: DatabaseConnection,
    exports_dir: PathBuf,
}

impl ChatService {
    pub fn new(db: DatabaseConnection, exports_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            exports_dir: exports_dir.into(),
        }
    }

    /// 只有会话所有者或管理员可以访问
    async fn authorized_chat(
        &self,
        user: &AuthenticatedUser,
        chat_id: Uuid,
    ) -> AssistResult<ChatInfo> {
        let chat = ChatRepository::find_by_id(&self.db, chat_id)
            .await?
            .ok_or_else(|| AssistError::not_found(format!("会话 {}", chat_id)))?;
        if chat.user_id != user.user_id && !user.is_admin() {
            return Err(AssistError::authorization("无权访问该会话"));
        }
        Ok(chat.into())
    }

    pub async fn create_chat(
        &self,
        user: &AuthenticatedUser,
        request: CreateChatRequest,
    ) -> AssistResult<ChatInfo> {
        let title = request.title.filter(|t| !t.trim().is_empty());
        Ok(ChatRepository::create(&self.db, user.user_id, title).await?.into())
    }

    pub async fn list_chats(&self, user: &AuthenticatedUser) -> AssistResult<Vec<ChatInfo>> {
        Ok(ChatRepository::list_by_user(&self.db, user.user_id)
            .await?
            .into_iter()
            .map(ChatInfo::from)
            .collect())
    }

    pub async fn get_chat(
        &self,
        user: &AuthenticatedUser,
        chat_id: Uuid,
    ) -> AssistResult<ChatInfo> {
        self.authorized_chat(user, chat_id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete_chat(&self, user: &AuthenticatedUser, chat_id: Uuid) -> AssistResult<()> {
        self.authorized_chat(user, chat_id).await?;
        ChatRepository::delete(&self.db, chat_id).await?;
        info!(chat_id = %chat_id, "会话已删除");
        Ok(())
    }

    pub async fn list_messages(
        &self,
        user: &AuthenticatedUser,
        chat_id: Uuid,
    ) -> AssistResult<Vec<MessageInfo>> {
        self.authorized_chat(user, chat_id).await?;
        Ok(ChatRepository::list_messages(&self.db, chat_id)
            .await?
            .into_iter()
            .map(MessageInfo::from)
            .collect())
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn add_message(
        &self,
        user: &AuthenticatedUser,
        chat_id: Uuid,
        request: SendMessageRequest,
    ) -> AssistResult<MessageInfo> {
        if request.content.trim().is_empty() && request.media.is_empty() {
            return Err(AssistError::validation("content", "消息内容不能为空"));
        }
        self.authorized_chat(user, chat_id).await?;

        let sender_id = (!request.is_ai_response).then_some(user.user_id);
        let attachments = request
            .media
            .into_iter()
            .map(|m| NewMedia {
                media_type: m.media_type,
                url: m.url,
                description: m.description,
            })
            .collect();

        let row = ChatRepository::add_message(
            &self.db,
            chat_id,
            sender_id,
            request.content,
            request.is_ai_response,
            attachments,
        )
        .await?;
        Ok(row.into())
    }

    /// 写出 JSON 快照并记录导出历史
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn export_chat(
        &self,
        user: &AuthenticatedUser,
        chat_id: Uuid,
    ) -> AssistResult<ExportInfo> {
        let chat = self.authorized_chat(user, chat_id).await?;
        let messages: Vec<MessageInfo> = ChatRepository::list_messages(&self.db, chat_id)
            .await?
            .into_iter()
            .map(MessageInfo::from)
            .collect();

        let now = Utc::now();
        let file_name = format!("chat_{}_{}.json", chat_id, now.timestamp_millis());
        let snapshot = json!({
            "chat": chat,
            "messages": messages,
            "exportedBy": user.user_id,
            "exportedAt": now,
        });

        tokio::fs::create_dir_all(&self.exports_dir).await?;
        tokio::fs::write(
            self.exports_dir.join(&file_name),
            serde_json::to_vec_pretty(&snapshot)?,
        )
        .await?;

        let record =
            ChatExportRepository::record(&self.db, chat_id, user.user_id, file_name).await?;
        info!(chat_id = %chat_id, file = %record.file_name, "会话已导出");

        Ok(ExportInfo {
            message_count: Some(messages.len()),
            ..record.into()
        })
    }

    pub async fn last_export(
        &self,
        user: &AuthenticatedUser,
        chat_id: Uuid,
    ) -> AssistResult<Option<ExportInfo>> {
        self.authorized_chat(user, chat_id).await?;
        Ok(ChatExportRepository::latest_for_chat(&self.db, chat_id)
            .await?
            .map(ExportInfo::from))
    }

    /// 返回 (文件名, CSV 内容)
    pub async fn export_csv(
        &self,
        user: &AuthenticatedUser,
        chat_id: Uuid,
    ) -> AssistResult<(String, String)> {
        let chat = self.authorized_chat(user, chat_id).await?;
        let messages: Vec<MessageInfo> = ChatRepository::list_messages(&self.db, chat_id)
            .await?
            .into_iter()
            .map(MessageInfo::from)
            .collect();
        Ok((csv_file_name(chat_id, Utc::now()), render_csv(&chat, &messages)))
    }
}
