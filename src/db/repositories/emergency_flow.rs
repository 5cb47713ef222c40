// 故障排查流程仓储实现

use crate::db::entities::{emergency_flow, prelude::*};
use crate::errors::AssistError;
use sea_orm::{prelude::*, *};
use tracing::instrument;

/// 流程仓储
pub struct EmergencyFlowRepository;

impl EmergencyFlowRepository {
    #[instrument(skip(db))]
    pub async fn list(db: &DatabaseConnection) -> Result<Vec<emergency_flow::Model>, AssistError> {
        Ok(EmergencyFlow::find()
            .order_by_desc(emergency_flow::Column::UpdatedAt)
            .all(db)
            .await?)
    }

    #[instrument(skip(db))]
    pub async fn find_by_id(
        db: &DatabaseConnection,
        id: &str,
    ) -> Result<Option<emergency_flow::Model>, AssistError> {
        Ok(EmergencyFlow::find_by_id(id.to_string()).one(db).await?)
    }

    #[instrument(skip(db, model), fields(flow_id = %model.id))]
    pub async fn insert(
        db: &DatabaseConnection,
        model: emergency_flow::Model,
    ) -> Result<emergency_flow::Model, AssistError> {
        if Self::find_by_id(db, &model.id).await?.is_some() {
            return Err(AssistError::conflict(format!("流程 '{}' 已存在", model.id)));
        }
        let active = emergency_flow::ActiveModel {
            id: Set(model.id),
            title: Set(model.title),
            description: Set(model.description),
            keyword: Set(model.keyword),
            steps: Set(model.steps),
            extra: Set(model.extra),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        };
        Ok(active.insert(db).await?)
    }

    /// 覆盖除 id 和 created_at 之外的所有字段
    #[instrument(skip(db, model), fields(flow_id = %model.id))]
    pub async fn update(
        db: &DatabaseConnection,
        model: emergency_flow::Model,
    ) -> Result<emergency_flow::Model, AssistError> {
        let existing = Self::find_by_id(db, &model.id)
            .await?
            .ok_or_else(|| AssistError::not_found(format!("流程 {}", model.id)))?;

        let mut active: emergency_flow::ActiveModel = existing.into();
        active.title = Set(model.title);
        active.description = Set(model.description);
        active.keyword = Set(model.keyword);
        active.steps = Set(model.steps);
        active.extra = Set(model.extra);
        active.updated_at = Set(model.updated_at);
        Ok(active.update(db).await?)
    }

    #[instrument(skip(db))]
    pub async fn delete(db: &DatabaseConnection, id: &str) -> Result<bool, AssistError> {
        let result = EmergencyFlow::delete_by_id(id.to_string()).exec(db).await?;
        Ok(result.rows_affected > 0)
    }
}
