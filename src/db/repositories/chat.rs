// 聊天记录仓储实现

use crate::db::entities::{chat, chat_export, media, message, prelude::*};
use crate::errors::AssistError;
use sea_orm::{prelude::*, *};
use tracing::{info, instrument};
use uuid::Uuid;

/// 新消息的附件
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub media_type: String,
    pub url: String,
    pub description: Option<String>,
}

/// 带附件的消息
#[derive(Debug, Clone)]
pub struct MessageWithMedia {
    pub message: message::Model,
    pub media: Vec<media::Model>,
}

/// 聊天仓储
pub struct ChatRepository;

impl ChatRepository {
    #[instrument(skip(db))]
    pub async fn create(
        db: &DatabaseConnection,
        user_id: Uuid,
        title: Option<String>,
    ) -> Result<chat::Model, AssistError> {
        let model = chat::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            title: Set(title),
            created_at: Set(chrono::Utc::now().into()),
        };
        let result = model.insert(db).await?;
        info!(chat_id = %result.id, "聊天会话创建成功");
        Ok(result)
    }

    #[instrument(skip(db))]
    pub async fn find_by_id(
        db: &DatabaseConnection,
        id: Uuid,
    ) -> Result<Option<chat::Model>, AssistError> {
        Ok(Chat::find_by_id(id).one(db).await?)
    }

    /// 用户的聊天会话，最新的在前
    #[instrument(skip(db))]
    pub async fn list_by_user(
        db: &DatabaseConnection,
        user_id: Uuid,
    ) -> Result<Vec<chat::Model>, AssistError> {
        Ok(Chat::find()
            .filter(chat::Column::UserId.eq(user_id))
            .order_by_desc(chat::Column::CreatedAt)
            .all(db)
            .await?)
    }

    #[instrument(skip(db))]
    pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<bool, AssistError> {
        let result = Chat::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    /// 在一个事务中写入消息及其附件
    #[instrument(skip(db, content, attachments))]
    pub async fn add_message(
        db: &DatabaseConnection,
        chat_id: Uuid,
        sender_id: Option<Uuid>,
        content: String,
        is_ai_response: bool,
        attachments: Vec<NewMedia>,
    ) -> Result<MessageWithMedia, AssistError> {
        let txn = db.begin().await?;
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();

        let message = message::ActiveModel {
            id: Set(Uuid::new_v4()),
            chat_id: Set(chat_id),
            sender_id: Set(sender_id),
            content: Set(content),
            is_ai_response: Set(is_ai_response),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut media = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let item = media::ActiveModel {
                id: Set(Uuid::new_v4()),
                message_id: Set(message.id),
                media_type: Set(attachment.media_type),
                url: Set(attachment.url),
                description: Set(attachment.description),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            media.push(item);
        }

        txn.commit().await?;
        Ok(MessageWithMedia { message, media })
    }

    /// 会话内的消息（按时间升序）及附件
    #[instrument(skip(db))]
    pub async fn list_messages(
        db: &DatabaseConnection,
        chat_id: Uuid,
    ) -> Result<Vec<MessageWithMedia>, AssistError> {
        let rows = Message::find()
            .filter(message::Column::ChatId.eq(chat_id))
            .order_by_asc(message::Column::CreatedAt)
            .order_by_asc(message::Column::Id)
            .find_with_related(Media)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(message, media)| MessageWithMedia { message, media })
            .collect())
    }
}

/// 聊天导出记录仓储
pub struct ChatExportRepository;

impl ChatExportRepository {
    #[instrument(skip(db))]
    pub async fn record(
        db: &DatabaseConnection,
        chat_id: Uuid,
        user_id: Uuid,
        file_name: String,
    ) -> Result<chat_export::Model, AssistError> {
        let model = chat_export::ActiveModel {
            id: Set(Uuid::new_v4()),
            chat_id: Set(chat_id),
            user_id: Set(user_id),
            file_name: Set(file_name),
            exported_at: Set(chrono::Utc::now().into()),
        };
        Ok(model.insert(db).await?)
    }

    #[instrument(skip(db))]
    pub async fn latest_for_chat(
        db: &DatabaseConnection,
        chat_id: Uuid,
    ) -> Result<Option<chat_export::Model>, AssistError> {
        Ok(ChatExport::find()
            .filter(chat_export::Column::ChatId.eq(chat_id))
            .order_by_desc(chat_export::Column::ExportedAt)
            .one(db)
            .await?)
    }
}
