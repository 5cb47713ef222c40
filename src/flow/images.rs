// 流程步骤图片的保存与读取

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use utoipa::ToSchema;

use super::model::IMAGE_URL_PREFIX;
use crate::errors::{AssistError, AssistResult};

/// 上传结果
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub image_url: String,
    pub file_name: String,
    /// 内容相同的图片已存在时复用旧文件
    pub is_duplicate: bool,
}

pub struct FlowImageStore {
    images_dir: PathBuf,
    fallback_dir: PathBuf,
    allowed_extensions: Vec<String>,
    max_bytes: u64,
}

impl FlowImageStore {
    pub fn new(knowledge_base: &Path, allowed_extensions: Vec<String>, max_bytes: u64) -> Self {
        let images = knowledge_base.join("images");
        Self {
            images_dir: images.join("emergency-flows"),
            fallback_dir: images.join("chat-exports"),
            allowed_extensions,
            max_bytes,
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// 校验扩展名与大小后保存；相同内容只保存一份
    pub async fn save(&self, original_name: &str, data: &[u8]) -> AssistResult<UploadedImage> {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !self.allowed_extensions.iter().any(|e| e == &extension) {
            return Err(AssistError::file_processing_with_name(
                "不支持的图片格式",
                original_name,
            ));
        }
        if data.is_empty() {
            return Err(AssistError::file_processing_with_name("文件为空", original_name));
        }
        if data.len() as u64 > self.max_bytes {
            return Err(AssistError::file_processing_with_name(
                format!("文件大小超过限制 ({} 字节)", self.max_bytes),
                original_name,
            ));
        }

        tokio::fs::create_dir_all(&self.images_dir).await?;

        let digest = sha256_hex(data);
        if let Some(existing) = self.find_duplicate(data.len() as u64, &digest).await? {
            debug!(file = %existing, "复用已存在的图片");
            return Ok(UploadedImage {
                image_url: format!("{}{}", IMAGE_URL_PREFIX, existing),
                file_name: existing,
                is_duplicate: true,
            });
        }

        let file_name = format!(
            "emergency-flow-step{}.{}",
            Utc::now().timestamp_millis(),
            extension
        );
        tokio::fs::write(self.images_dir.join(&file_name), data).await?;
        info!(file = %file_name, bytes = data.len(), "流程图片已保存");

        Ok(UploadedImage {
            image_url: format!("{}{}", IMAGE_URL_PREFIX, file_name),
            file_name,
            is_duplicate: false,
        })
    }

    async fn find_duplicate(&self, size: u64, digest: &str) -> AssistResult<Option<String>> {
        let mut entries = tokio::fs::read_dir(&self.images_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || metadata.len() != size {
                continue;
            }
            let content = tokio::fs::read(entry.path()).await?;
            if sha256_hex(&content) == digest {
                return Ok(entry.file_name().to_str().map(str::to_string));
            }
        }
        Ok(None)
    }

    /// 先查流程图片目录，再查聊天导出图片目录
    pub async fn resolve(&self, file_name: &str) -> AssistResult<(PathBuf, &'static str)> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(AssistError::validation("fileName", "无效的文件名"));
        }

        for dir in [&self.images_dir, &self.fallback_dir] {
            let path = dir.join(file_name);
            if tokio::fs::try_exists(&path).await? {
                return Ok((path, content_type_for(file_name)));
            }
        }
        Err(AssistError::not_found(format!("图片 {}", file_name)))
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
