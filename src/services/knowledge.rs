// 知识库服务
// 目录布局、数据文件读取与文档管理

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use emergency_assist_common::{PaginatedResponse, PaginationParams};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::chunker::TextChunker;
use crate::db::entities::document;
use crate::db::repositories::DocumentRepository;
use crate::errors::{AssistError, AssistResult};

/// data 目录下的 JSON 文件
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataFileInfo {
    pub filename: String,
    /// 去掉扩展名
    pub name: String,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub path: String,
}

/// 新建文档请求
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: String,
}

/// 文档信息
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub id: Uuid,
    pub title: String,
    pub user_id: Uuid,
    pub chunk_count: i32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DocumentInfo {
    fn from_model(model: document::Model, with_content: bool) -> Self {
        Self {
            id: model.id,
            title: model.title,
            user_id: model.user_id,
            chunk_count: model.chunk_count,
            created_at: model.created_at.with_timezone(&Utc),
            content: with_content.then_some(model.content),
        }
    }
}

/// 知识库根目录及其子目录
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    root: PathBuf,
}

impl KnowledgeBase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn troubleshooting_dir(&self) -> PathBuf {
        self.root.join("troubleshooting")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    pub fn flow_images_dir(&self) -> PathBuf {
        self.root.join("images").join("emergency-flows")
    }

    pub fn log_backup_dir(&self) -> PathBuf {
        self.root.join("backups").join("log")
    }

    /// 启动时创建所有子目录
    pub async fn ensure_layout(&self) -> AssistResult<()> {
        for dir in [
            self.data_dir(),
            self.troubleshooting_dir(),
            self.exports_dir(),
            self.flow_images_dir(),
            self.log_backup_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        info!(root = %self.root.display(), "知识库目录已就绪");
        Ok(())
    }

    /// 目录不存在时返回空列表
    #[instrument(skip(self))]
    pub async fn list_data_files(&self) -> AssistResult<Vec<DataFileInfo>> {
        let dir = self.data_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            if !filename.ends_with(".json") {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            files.push(DataFileInfo {
                name: filename.trim_end_matches(".json").to_string(),
                size: metadata.len(),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
                path: format!("data/{}", filename),
                filename,
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /// 只允许读取 data 目录下的 .json 文件
    #[instrument(skip(self))]
    pub async fn read_data_file(&self, filename: &str) -> AssistResult<Value> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(AssistError::validation("filename", "文件名不能包含路径"));
        }
        if !filename.ends_with(".json") {
            return Err(AssistError::validation("filename", "只支持 JSON 文件"));
        }

        let path = self.data_dir().join(filename);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssistError::not_found(format!("文件 {}", filename)));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| {
            AssistError::file_processing_with_name(format!("JSON 解析失败: {}", e), filename)
        })
    }
}

/// 数据库中的知识文档
pub struct DocumentService {
    db: DatabaseConnection,
    chunker: TextChunker,
}

impl DocumentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            chunker: TextChunker::default(),
        }
    }

    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create(
        &self,
        user_id: Uuid,
        request: CreateDocumentRequest,
    ) -> AssistResult<DocumentInfo> {
        if request.title.trim().is_empty() {
            return Err(AssistError::validation("title", "标题不能为空"));
        }
        if request.content.trim().is_empty() {
            return Err(AssistError::validation("content", "内容不能为空"));
        }

        let metadata: Map<String, Value> = json!({ "title": request.title })
            .as_object()
            .cloned()
            .unwrap_or_default();
        let chunk_count = self.chunker.chunk(&request.content, &metadata).len();

        let model = DocumentRepository::create(
            &self.db,
            user_id,
            request.title.trim().to_string(),
            request.content,
            i32::try_from(chunk_count).unwrap_or(i32::MAX),
        )
        .await?;
        Ok(DocumentInfo::from_model(model, false))
    }

    pub async fn list(
        &self,
        params: &PaginationParams,
    ) -> AssistResult<PaginatedResponse<DocumentInfo>> {
        let (items, total) = DocumentRepository::list(&self.db, params).await?;
        let items = items
            .into_iter()
            .map(|m| DocumentInfo::from_model(m, false))
            .collect();
        Ok(PaginatedResponse::new(
            items,
            total,
            params.page(),
            params.page_size(),
        ))
    }

    pub async fn get(&self, id: Uuid) -> AssistResult<DocumentInfo> {
        DocumentRepository::find_by_id(&self.db, id)
            .await?
            .map(|m| DocumentInfo::from_model(m, true))
            .ok_or_else(|| AssistError::not_found(format!("文档 {}", id)))
    }

    pub async fn delete(&self, id: Uuid) -> AssistResult<()> {
        if !DocumentRepository::delete(&self.db, id).await? {
            return Err(AssistError::not_found(format!("文档 {}", id)));
        }
        info!(document_id = %id, "文档已删除");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_data_files() {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::new(dir.path());

        assert!(kb.list_data_files().await.unwrap().is_empty());

        kb.ensure_layout().await.unwrap();
        std::fs::write(kb.data_dir().join("engine.json"), r#"{"parts": 3}"#).unwrap();
        std::fs::write(kb.data_dir().join("brake.json"), "[]").unwrap();
        std::fs::write(kb.data_dir().join("readme.txt"), "skip").unwrap();

        let files = kb.list_data_files().await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["brake", "engine"]);
        assert_eq!(files[1].size, 12);
        assert_eq!(files[1].path, "data/engine.json");
        assert!(files[1].modified_at.is_some());
    }

    #[tokio::test]
    async fn test_read_data_file() {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::new(dir.path());
        kb.ensure_layout().await.unwrap();
        std::fs::write(kb.data_dir().join("engine.json"), r#"{"parts": 3}"#).unwrap();

        let value = kb.read_data_file("engine.json").await.unwrap();
        assert_eq!(value["parts"], 3);

        assert!(matches!(
            kb.read_data_file("missing.json").await,
            Err(AssistError::NotFound { .. })
        ));
        assert!(matches!(
            kb.read_data_file("engine.txt").await,
            Err(AssistError::Validation { .. })
        ));
        assert!(matches!(
            kb.read_data_file("../config.json").await,
            Err(AssistError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_ensure_layout() {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::new(dir.path().join("kb"));
        kb.ensure_layout().await.unwrap();

        assert!(kb.troubleshooting_dir().is_dir());
        assert!(kb.flow_images_dir().is_dir());
        assert!(kb.log_backup_dir().is_dir());
        assert!(kb.exports_dir().is_dir());
    }
}
