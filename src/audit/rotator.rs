// 审计日志轮转
// 文件超过阈值时改名、压缩并上传到 Blob 存储

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use super::logger::AuditLogger;
use crate::config::AuditConfig;
use crate::errors::{AssistError, AssistResult};
use crate::services::blob::BlobUploader;

/// 一次轮转的结果
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub archive: PathBuf,
    pub blob_name: String,
    pub uploaded: bool,
}

pub struct AuditRotator {
    logger: Arc<AuditLogger>,
    max_bytes: u64,
    interval: Duration,
    compress: bool,
    container: String,
    path_prefix: String,
    uploader: Option<Arc<dyn BlobUploader>>,
    rotating: AtomicBool,
}

/// 离开作用域时清除轮转标记
struct RotatingGuard<'a>(&'a AtomicBool);

impl Drop for RotatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AuditRotator {
    pub fn new(
        logger: Arc<AuditLogger>,
        config: &AuditConfig,
        uploader: Option<Arc<dyn BlobUploader>>,
    ) -> Self {
        Self {
            logger,
            max_bytes: config.rotate_max_bytes,
            interval: Duration::from_secs(config.rotate_interval_secs.max(1)),
            compress: config.compress,
            container: config.container.clone(),
            path_prefix: config.resolved_path_prefix(),
            uploader,
            rotating: AtomicBool::new(false),
        }
    }

    /// 文件大小达到阈值时轮转
    pub async fn rotate_if_needed(&self) -> AssistResult<Option<RotationOutcome>> {
        let size = match tokio::fs::metadata(self.logger.log_file()).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if size < self.max_bytes {
            return Ok(None);
        }
        self.rotate().await
    }

    /// 立即轮转；已有轮转在进行或文件为空时返回 None
    #[instrument(skip(self))]
    pub async fn rotate(&self) -> AssistResult<Option<RotationOutcome>> {
        if self
            .rotating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(None);
        }
        let _guard = RotatingGuard(&self.rotating);

        let log_file = self.logger.log_file().to_path_buf();
        let rotated = {
            let _file = self.logger.lock_file().await;
            self.logger.flush_locked().await?;

            match tokio::fs::metadata(&log_file).await {
                Ok(metadata) if metadata.len() > 0 => {}
                Ok(_) => return Ok(None),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            let rotated = log_file.with_file_name(rotated_file_name());
            tokio::fs::rename(&log_file, &rotated).await?;
            rotated
        };

        let archive = if self.compress {
            let source = rotated.clone();
            let archive = tokio::task::spawn_blocking(move || gzip_file(&source))
                .await
                .map_err(|e| AssistError::internal(format!("压缩任务失败: {}", e)))??;
            tokio::fs::remove_file(&rotated).await?;
            archive
        } else {
            rotated
        };

        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let blob_name = format!("{}{}", self.path_prefix, file_name);
        info!(archive = %archive.display(), "审计日志已轮转");

        let uploaded = match &self.uploader {
            Some(uploader) => {
                let content_type = if self.compress {
                    "application/gzip"
                } else {
                    "text/plain"
                };
                match tokio::fs::read(&archive).await {
                    Ok(data) => match uploader
                        .upload(&self.container, &blob_name, data, content_type)
                        .await
                    {
                        Ok(()) => {
                            info!(container = %self.container, blob = %blob_name, "审计日志已上传");
                            true
                        }
                        Err(e) => {
                            warn!(blob = %blob_name, error = %e, "审计日志上传失败");
                            false
                        }
                    },
                    Err(e) => {
                        warn!(archive = %archive.display(), error = %e, "读取归档失败");
                        false
                    }
                }
            }
            None => false,
        };

        Ok(Some(RotationOutcome {
            archive,
            blob_name,
            uploaded,
        }))
    }

    /// 启动定时检查任务
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval 的第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.rotate_if_needed().await {
                    warn!(error = %e, "审计日志轮转失败");
                }
            }
        })
    }
}

/// audit-<ISO 时间>.log，冒号和点替换为连字符
pub fn rotated_file_name() -> String {
    let stamp = Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("audit-{}.log", stamp)
}

/// 压缩为同名 .gz 文件并返回其路径
pub fn gzip_file(source: &Path) -> AssistResult<PathBuf> {
    let data = std::fs::read(source)?;
    let mut target = source.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let file = std::fs::File::create(&target)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&data)?;
    encoder.finish()?;
    Ok(target)
}
