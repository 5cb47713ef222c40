// 知识库文档仓储实现

use crate::db::entities::{document, prelude::*};
use crate::errors::AssistError;
use emergency_assist_common::PaginationParams;
use sea_orm::{prelude::*, *};
use tracing::{info, instrument};
use uuid::Uuid;

/// 文档仓储
pub struct DocumentRepository;

impl DocumentRepository {
    #[instrument(skip(db, content))]
    pub async fn create(
        db: &DatabaseConnection,
        user_id: Uuid,
        title: String,
        content: String,
        chunk_count: i32,
    ) -> Result<document::Model, AssistError> {
        let model = document::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            content: Set(content),
            user_id: Set(user_id),
            chunk_count: Set(chunk_count),
            created_at: Set(chrono::Utc::now().into()),
        };
        let result = model.insert(db).await?;
        info!(document_id = %result.id, chunk_count, "文档创建成功");
        Ok(result)
    }

    #[instrument(skip(db))]
    pub async fn find_by_id(
        db: &DatabaseConnection,
        id: Uuid,
    ) -> Result<Option<document::Model>, AssistError> {
        Ok(Document::find_by_id(id).one(db).await?)
    }

    /// 分页列出文档，返回 (当前页, 总数)
    #[instrument(skip(db))]
    pub async fn list(
        db: &DatabaseConnection,
        params: &PaginationParams,
    ) -> Result<(Vec<document::Model>, u64), AssistError> {
        let paginator = Document::find()
            .order_by_desc(document::Column::CreatedAt)
            .paginate(db, params.page_size());
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(params.page() - 1).await?;
        Ok((items, total))
    }

    #[instrument(skip(db))]
    pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<bool, AssistError> {
        let result = Document::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }
}
