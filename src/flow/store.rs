// 流程存储后端
// 文件后端与数据库后端实现同一个 FlowStore 接口

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::DatabaseConnection;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::model::{FlowDocument, FlowStep};
use crate::db::entities::emergency_flow;
use crate::db::repositories::EmergencyFlowRepository;
use crate::errors::{AssistError, AssistResult};

static FLOW_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid regex"));

/// 流程 id 只允许字母、数字、下划线和连字符
pub fn validate_flow_id(id: &str) -> AssistResult<()> {
    if FLOW_ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(AssistError::validation("id", format!("无效的流程 id: {}", id)))
    }
}

pub fn generate_flow_id() -> String {
    format!("flow_{}", Utc::now().timestamp_millis())
}

#[async_trait]
pub trait FlowStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// 读取全部流程（原始存储形式）
    async fn fetch_all(&self) -> AssistResult<Vec<FlowDocument>>;

    async fn fetch(&self, id: &str) -> AssistResult<Option<FlowDocument>>;

    /// 新增；id 已存在时返回冲突
    async fn insert(&self, document: &FlowDocument) -> AssistResult<()>;

    /// 覆盖已存在的流程
    async fn replace(&self, document: &FlowDocument) -> AssistResult<()>;

    /// 返回是否确实删除了记录
    async fn remove(&self, id: &str) -> AssistResult<bool>;

    async fn list(&self) -> AssistResult<Vec<FlowDocument>> {
        let mut documents = self.fetch_all().await?;
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        for document in &mut documents {
            document.expand_image_urls();
        }
        Ok(documents)
    }

    async fn get(&self, id: &str) -> AssistResult<FlowDocument> {
        validate_flow_id(id)?;
        let mut document = self
            .fetch(id)
            .await?
            .ok_or_else(|| AssistError::not_found(format!("流程 {}", id)))?;
        document.expand_image_urls();
        Ok(document)
    }

    async fn create(&self, mut document: FlowDocument) -> AssistResult<FlowDocument> {
        if document.title.trim().is_empty() {
            return Err(AssistError::validation("title", "标题不能为空"));
        }
        if document.id.is_empty() {
            document.id = generate_flow_id();
        }
        validate_flow_id(&document.id)?;

        let now = Utc::now();
        document.created_at = Some(now);
        document.updated_at = Some(now);
        document.normalize_image_urls();

        self.insert(&document).await?;
        info!(flow_id = %document.id, backend = self.backend_name(), "流程已创建");

        document.expand_image_urls();
        Ok(document)
    }

    async fn update(&self, id: &str, mut document: FlowDocument) -> AssistResult<FlowDocument> {
        validate_flow_id(id)?;
        let existing = self
            .fetch(id)
            .await?
            .ok_or_else(|| AssistError::not_found(format!("流程 {}", id)))?;

        document.id = id.to_string();
        document.created_at = existing.created_at.or(Some(Utc::now()));
        document.updated_at = Some(Utc::now());
        document.normalize_image_urls();

        self.replace(&document).await?;
        info!(flow_id = %id, backend = self.backend_name(), "流程已更新");

        document.expand_image_urls();
        Ok(document)
    }

    async fn delete(&self, id: &str) -> AssistResult<()> {
        validate_flow_id(id)?;
        if !self.remove(id).await? {
            return Err(AssistError::not_found(format!("流程 {}", id)));
        }
        info!(flow_id = %id, backend = self.backend_name(), "流程已删除");
        Ok(())
    }

    async fn update_step_title(
        &self,
        flow_id: &str,
        step_id: &str,
        title: &str,
    ) -> AssistResult<FlowDocument> {
        validate_flow_id(flow_id)?;
        let mut document = self
            .fetch(flow_id)
            .await?
            .ok_or_else(|| AssistError::not_found(format!("流程 {}", flow_id)))?;

        let step = document
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| AssistError::not_found(format!("步骤 {}", step_id)))?;
        step.title = title.to_string();
        document.updated_at = Some(Utc::now());

        self.replace(&document).await?;
        document.expand_image_urls();
        Ok(document)
    }

    async fn search(&self, query: &str) -> AssistResult<Vec<FlowDocument>> {
        let documents = self.list().await?;
        let matched: Vec<FlowDocument> = documents
            .into_iter()
            .filter(|d| d.matches(query))
            .collect();
        debug!(query = %query, hits = matched.len(), "流程搜索");
        Ok(matched)
    }
}

/// 每个流程一个 JSON 文件
pub struct FileFlowStore {
    dir: PathBuf,
}

impl FileFlowStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn write_document(&self, document: &FlowDocument) -> AssistResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_string_pretty(document)?;

        // 先写临时文件再改名，列表读取会跳过 .tmp
        let target = self.path_for(&document.id);
        let temp = self.dir.join(format!("{}.json.tmp", document.id));
        tokio::fs::write(&temp, content).await?;
        tokio::fs::rename(&temp, &target).await?;
        Ok(())
    }

    async fn read_document(path: &Path) -> AssistResult<FlowDocument> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut document: FlowDocument = serde_json::from_str(&content).map_err(|e| {
            AssistError::file_processing_with_name(
                format!("流程文件解析失败: {}", e),
                path.display().to_string(),
            )
        })?;
        if document.id.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                document.id = stem.to_string();
            }
        }
        Ok(document)
    }
}

fn is_flow_file(name: &str) -> bool {
    name.ends_with(".json") && !name.contains(".backup") && !name.contains(".tmp")
}

#[async_trait]
impl FlowStore for FileFlowStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn fetch_all(&self) -> AssistResult<Vec<FlowDocument>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_flow_file(name) {
                continue;
            }
            match Self::read_document(&path).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!(file = %name, error = %e, "跳过无法读取的流程文件"),
            }
        }
        Ok(documents)
    }

    async fn fetch(&self, id: &str) -> AssistResult<Option<FlowDocument>> {
        let path = self.path_for(id);
        match Self::read_document(&path).await {
            Ok(document) => Ok(Some(document)),
            Err(AssistError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, document: &FlowDocument) -> AssistResult<()> {
        if tokio::fs::try_exists(self.path_for(&document.id)).await? {
            return Err(AssistError::conflict(format!("流程 '{}' 已存在", document.id)));
        }
        self.write_document(document).await
    }

    async fn replace(&self, document: &FlowDocument) -> AssistResult<()> {
        self.write_document(document).await
    }

    async fn remove(&self, id: &str) -> AssistResult<bool> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// emergency_flows 表
pub struct DbFlowStore {
    db: DatabaseConnection,
}

impl DbFlowStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn document_from_model(model: emergency_flow::Model) -> AssistResult<FlowDocument> {
    let steps: Vec<FlowStep> = serde_json::from_value(model.steps)?;
    let extra = match model.extra {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok(FlowDocument {
        id: model.id,
        title: model.title,
        description: model.description,
        keyword: model.keyword,
        steps,
        created_at: Some(model.created_at.with_timezone(&Utc)),
        updated_at: Some(model.updated_at.with_timezone(&Utc)),
        extra,
    })
}

fn model_from_document(document: &FlowDocument) -> AssistResult<emergency_flow::Model> {
    let now = Utc::now();
    Ok(emergency_flow::Model {
        id: document.id.clone(),
        title: document.title.clone(),
        description: document.description.clone(),
        keyword: document.keyword.clone(),
        steps: serde_json::to_value(&document.steps)?,
        extra: Value::Object(document.extra.clone()),
        created_at: document.created_at.unwrap_or(now).into(),
        updated_at: document.updated_at.unwrap_or(now).into(),
    })
}

#[async_trait]
impl FlowStore for DbFlowStore {
    fn backend_name(&self) -> &'static str {
        "database"
    }

    async fn fetch_all(&self) -> AssistResult<Vec<FlowDocument>> {
        let models = EmergencyFlowRepository::list(&self.db).await?;
        let mut documents = Vec::with_capacity(models.len());
        for model in models {
            let id = model.id.clone();
            match document_from_model(model) {
                Ok(document) => documents.push(document),
                Err(e) => warn!(flow_id = %id, error = %e, "跳过无法解析的流程记录"),
            }
        }
        Ok(documents)
    }

    async fn fetch(&self, id: &str) -> AssistResult<Option<FlowDocument>> {
        EmergencyFlowRepository::find_by_id(&self.db, id)
            .await?
            .map(document_from_model)
            .transpose()
    }

    async fn insert(&self, document: &FlowDocument) -> AssistResult<()> {
        EmergencyFlowRepository::insert(&self.db, model_from_document(document)?).await?;
        Ok(())
    }

    async fn replace(&self, document: &FlowDocument) -> AssistResult<()> {
        EmergencyFlowRepository::update(&self.db, model_from_document(document)?).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> AssistResult<bool> {
        EmergencyFlowRepository::delete(&self.db, id).await
    }
}
