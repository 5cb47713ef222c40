// 技术支持维护任务
// 上传目录清理与日志备份

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::blob::{upload_with_retry, BlobUploader};
use crate::errors::{AssistError, AssistResult};
use crate::flow::images::sha256_hex;

/// 未完成上传的保留时间
const STALE_UPLOAD_AGE: Duration = Duration::from_secs(72 * 3600);
const BACKUP_UPLOAD_ATTEMPTS: u32 = 3;

static TEMP_DIR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(tmp|temp)$").expect("valid regex"));
static MONTH_DIR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("valid regex"));
/// 审计轮转产生的 audit-<时间>.log，由轮转任务负责上传
static ROTATED_AUDIT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^audit-.+\.log$").expect("valid regex"));

const STALE_EXTENSIONS: [&str; 3] = ["part", "upload", "incomplete"];
const LOG_SUFFIXES: [&str; 4] = [".log", ".log.json", ".out", ".err"];

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupDetail {
    pub path: String,
    pub kind: String,
    pub reason: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub removed_files: usize,
    pub removed_dirs: usize,
    pub freed_bytes: u64,
    pub details: Vec<CleanupDetail>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub source: String,
    pub archive: String,
    pub original_bytes: u64,
    pub archive_bytes: u64,
    pub uploaded: bool,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
    pub archived: Vec<BackupEntry>,
    /// 校验失败或读取失败而保留原文件的日志
    pub skipped: Vec<String>,
    pub pruned_months: Vec<String>,
}

/// 单个文件的清理原因，不需要清理时返回 None
fn file_cleanup_reason(path: &Path, modified: SystemTime, now: SystemTime) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)?;
    if ext == "tmp" {
        return Some("临时文件");
    }
    if STALE_EXTENSIONS.contains(&ext.as_str()) {
        let age = now.duration_since(modified).unwrap_or_default();
        if age > STALE_UPLOAD_AGE {
            return Some("超过 72 小时的未完成上传");
        }
    }
    None
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| match entry.metadata() {
            Ok(meta) if meta.is_dir() => dir_size(&entry.path()),
            Ok(meta) => meta.len(),
            Err(_) => 0,
        })
        .sum()
}

/// 递归收集普通文件和临时目录
fn walk(root: &Path, files: &mut Vec<PathBuf>, temp_dirs: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| TEMP_DIR_PATTERN.is_match(name));
            if is_temp {
                temp_dirs.push(path.clone());
            }
            walk(&path, files, temp_dirs);
        } else if file_type.is_file() {
            files.push(path);
        }
    }
}

/// 清理上传目录，不存在的目录直接跳过
pub fn cleanup_paths(roots: &[PathBuf], now: SystemTime) -> CleanupReport {
    let mut report = CleanupReport::default();

    for root in roots.iter().filter(|r| r.is_dir()) {
        let mut files = Vec::new();
        let mut temp_dirs = Vec::new();
        walk(root, &mut files, &mut temp_dirs);

        for file in files {
            let Ok(meta) = std::fs::metadata(&file) else {
                continue;
            };
            let modified = meta.modified().unwrap_or(now);
            let Some(reason) = file_cleanup_reason(&file, modified, now) else {
                continue;
            };
            match std::fs::remove_file(&file) {
                Ok(()) => {
                    report.removed_files += 1;
                    report.freed_bytes += meta.len();
                    report.details.push(CleanupDetail {
                        path: file.display().to_string(),
                        kind: "file".to_string(),
                        reason: reason.to_string(),
                        bytes: meta.len(),
                    });
                }
                Err(e) => warn!(path = %file.display(), error = %e, "删除文件失败"),
            }
        }

        // 深层目录先删
        temp_dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in temp_dirs {
            if !dir.exists() {
                continue;
            }
            let bytes = dir_size(&dir);
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {
                    report.removed_dirs += 1;
                    report.freed_bytes += bytes;
                    report.details.push(CleanupDetail {
                        path: dir.display().to_string(),
                        kind: "dir".to_string(),
                        reason: "临时目录".to_string(),
                        bytes,
                    });
                }
                Err(e) => warn!(path = %dir.display(), error = %e, "删除目录失败"),
            }
        }
    }

    report
}

fn is_log_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    LOG_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

fn is_rotated_audit_log(name: &str) -> bool {
    ROTATED_AUDIT_PATTERN.is_match(name)
}

fn gzip_bytes(data: &[u8]) -> AssistResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gunzip_bytes(data: &[u8]) -> AssistResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// 压缩单个日志，校验通过后删除原文件
fn archive_one(source: &Path, target: &Path) -> AssistResult<(u64, u64)> {
    let original = std::fs::read(source)?;
    let compressed = gzip_bytes(&original)?;
    std::fs::write(target, &compressed)?;

    let restored = gunzip_bytes(&std::fs::read(target)?)?;
    if sha256_hex(&restored) != sha256_hex(&original) {
        std::fs::remove_file(target)?;
        return Err(AssistError::file_processing_with_name(
            "备份校验失败",
            source.display().to_string(),
        ));
    }

    std::fs::remove_file(source)?;
    Ok((original.len() as u64, compressed.len() as u64))
}

/// 压缩 log_dir 顶层的日志文件到 backup_root/<YYYY-MM>/
pub fn archive_logs(
    log_dir: &Path,
    backup_root: &Path,
    exclude: &[PathBuf],
    now: DateTime<Utc>,
) -> AssistResult<BackupReport> {
    let mut report = BackupReport::default();
    if !log_dir.is_dir() {
        return Ok(report);
    }

    let month_dir = backup_root.join(now.format("%Y-%m").to_string());
    std::fs::create_dir_all(&month_dir)?;
    let stamp = now.format("%Y%m%dT%H%M%S").to_string();

    let mut sources: Vec<PathBuf> = std::fs::read_dir(log_dir)?
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| is_log_file(name) && !is_rotated_audit_log(name))
        })
        .filter(|path| !exclude.contains(path))
        .collect();
    sources.sort();

    for source in sources {
        let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let target = month_dir.join(format!("{}__{}.gz", stamp, name));
        match archive_one(&source, &target) {
            Ok((original_bytes, archive_bytes)) => report.archived.push(BackupEntry {
                source: source.display().to_string(),
                archive: target.display().to_string(),
                original_bytes,
                archive_bytes,
                uploaded: false,
            }),
            Err(e) => {
                warn!(file = %source.display(), error = %e, "日志备份失败，保留原文件");
                report.skipped.push(source.display().to_string());
            }
        }
    }

    Ok(report)
}

/// 只保留最新的 keep 个月份目录
pub fn prune_months(backup_root: &Path, keep: usize) -> AssistResult<Vec<String>> {
    if !backup_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut months: Vec<String> = std::fs::read_dir(backup_root)?
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| MONTH_DIR_PATTERN.is_match(name))
        .collect();
    months.sort_by(|a, b| b.cmp(a));

    let mut pruned = Vec::new();
    for month in months.into_iter().skip(keep) {
        std::fs::remove_dir_all(backup_root.join(&month))?;
        pruned.push(month);
    }
    Ok(pruned)
}

pub struct MaintenanceService {
    uploads_paths: Vec<PathBuf>,
    log_dir: PathBuf,
    backup_root: PathBuf,
    exclude: Vec<PathBuf>,
    retention_months: usize,
    uploader: Option<Arc<dyn BlobUploader>>,
    container: String,
}

impl MaintenanceService {
    pub fn new(
        uploads_paths: Vec<PathBuf>,
        log_dir: impl Into<PathBuf>,
        backup_root: impl Into<PathBuf>,
        retention_months: u32,
    ) -> Self {
        Self {
            uploads_paths,
            log_dir: log_dir.into(),
            backup_root: backup_root.into(),
            exclude: Vec::new(),
            retention_months: retention_months.max(1) as usize,
            uploader: None,
            container: String::new(),
        }
    }

    /// 正在写入的日志文件不参与备份
    pub fn with_excluded(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }

    pub fn with_uploader(
        mut self,
        uploader: Arc<dyn BlobUploader>,
        container: impl Into<String>,
    ) -> Self {
        self.uploader = Some(uploader);
        self.container = container.into();
        self
    }

    #[instrument(skip(self))]
    pub async fn cleanup_uploads(&self) -> AssistResult<CleanupReport> {
        let roots = self.uploads_paths.clone();
        let report = tokio::task::spawn_blocking(move || cleanup_paths(&roots, SystemTime::now()))
            .await
            .map_err(|e| AssistError::internal(format!("清理任务失败: {}", e)))?;
        info!(
            files = report.removed_files,
            dirs = report.removed_dirs,
            bytes = report.freed_bytes,
            "上传目录清理完成"
        );
        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn backup_logs(&self) -> AssistResult<BackupReport> {
        let log_dir = self.log_dir.clone();
        let backup_root = self.backup_root.clone();
        let exclude = self.exclude.clone();
        let keep = self.retention_months;
        let mut report = tokio::task::spawn_blocking(move || {
            let mut report = archive_logs(&log_dir, &backup_root, &exclude, Utc::now())?;
            report.pruned_months = prune_months(&backup_root, keep)?;
            Ok::<_, AssistError>(report)
        })
        .await
        .map_err(|e| AssistError::internal(format!("备份任务失败: {}", e)))??;

        if let Some(uploader) = &self.uploader {
            for entry in &mut report.archived {
                let path = PathBuf::from(&entry.archive);
                let Some(blob_name) = self.blob_name(&path) else {
                    continue;
                };
                let data = tokio::fs::read(&path).await?;
                match upload_with_retry(
                    uploader.as_ref(),
                    &self.container,
                    &blob_name,
                    &data,
                    "application/gzip",
                    BACKUP_UPLOAD_ATTEMPTS,
                )
                .await
                {
                    Ok(()) => entry.uploaded = true,
                    Err(e) => warn!(blob = %blob_name, error = %e, "日志备份上传失败"),
                }
            }
        }

        info!(
            archived = report.archived.len(),
            skipped = report.skipped.len(),
            pruned = report.pruned_months.len(),
            "日志备份完成"
        );
        Ok(report)
    }

    /// backups/log/<YYYY-MM>/<文件名>
    fn blob_name(&self, archive: &Path) -> Option<String> {
        let file = archive.file_name()?.to_str()?;
        let month = archive.parent()?.file_name()?.to_str()?;
        Some(format!("backups/log/{}/{}", month, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::blob::testing::RecordingUploader;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn age_file(path: &Path, hours: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(hours * 3600))
            .unwrap();
    }

    #[test]
    fn test_cleanup_selection() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("uploads");
        std::fs::create_dir_all(root.join("photos/Temp/inner/tmp")).unwrap();
        std::fs::write(root.join("a.tmp"), b"1234").unwrap();
        std::fs::write(root.join("old.part"), b"12").unwrap();
        std::fs::write(root.join("new.upload"), b"12").unwrap();
        std::fs::write(root.join("keep.png"), b"png").unwrap();
        std::fs::write(root.join("photos/Temp/inner/tmp/x.bin"), b"xyz").unwrap();
        age_file(&root.join("old.part"), 100);
        age_file(&root.join("new.upload"), 1);

        let report = cleanup_paths(&[root.clone(), dir.path().join("missing")], SystemTime::now());

        assert_eq!(report.removed_files, 2);
        assert!(!root.join("a.tmp").exists());
        assert!(!root.join("old.part").exists());
        assert!(root.join("new.upload").exists());
        assert!(root.join("keep.png").exists());
        assert!(!root.join("photos/Temp").exists());
        assert!(root.join("photos").exists());
        // 内层 tmp 先删，外层 Temp 再删
        assert_eq!(report.removed_dirs, 2);
        assert_eq!(report.freed_bytes, 4 + 2 + 3);
    }

    #[test]
    fn test_log_file_matching() {
        assert!(is_log_file("server.log"));
        assert!(is_log_file("audit.LOG.json"));
        assert!(is_log_file("worker.out"));
        assert!(is_log_file("worker.err"));
        assert!(!is_log_file("server.log.gz"));
        assert!(!is_log_file("notes.txt"));

        assert!(is_rotated_audit_log("audit-2024-06-01T12-00-00-000Z.log"));
        assert!(!is_rotated_audit_log("audit.log"));
        assert!(!is_rotated_audit_log("audit-2024-06-01T12-00-00-000Z.log.gz"));
        assert!(!is_rotated_audit_log("server-audit-1.log"));
    }

    #[test]
    fn test_archive_logs_verifies_and_removes_originals() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        let backups = dir.path().join("backups/log");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("server.log"), "line 1\nline 2\n").unwrap();
        std::fs::write(logs.join("audit.log"), "{}\n").unwrap();
        std::fs::write(logs.join("audit-2024-06-01T11-55-00-000Z.log"), "{}\n").unwrap();
        std::fs::write(logs.join("readme.txt"), "keep").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let report = archive_logs(&logs, &backups, &[logs.join("audit.log")], now).unwrap();

        assert_eq!(report.archived.len(), 1);
        let archive = backups.join("2024-06/20240601T120000__server.log.gz");
        assert!(archive.exists());
        assert!(!logs.join("server.log").exists());
        assert!(logs.join("audit.log").exists());
        // 未压缩的轮转审计日志留给轮转任务
        assert!(logs.join("audit-2024-06-01T11-55-00-000Z.log").exists());
        assert!(logs.join("readme.txt").exists());

        let restored = gunzip_bytes(&std::fs::read(&archive).unwrap()).unwrap();
        assert_eq!(restored, b"line 1\nline 2\n");
    }

    #[test]
    fn test_prune_keeps_newest_months() {
        let dir = TempDir::new().unwrap();
        for month in ["2024-01", "2024-02", "2024-03", "2024-04"] {
            std::fs::create_dir_all(dir.path().join(month)).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("other")).unwrap();

        let pruned = prune_months(dir.path(), 2).unwrap();

        assert_eq!(pruned, vec!["2024-02".to_string(), "2024-01".to_string()]);
        assert!(dir.path().join("2024-04").exists());
        assert!(dir.path().join("2024-03").exists());
        assert!(dir.path().join("other").exists());
    }

    #[tokio::test]
    async fn test_backup_logs_uploads_archives() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("app.err"), "boom").unwrap();

        let uploader = Arc::new(RecordingUploader {
            fail_times: 1,
            ..Default::default()
        });
        let service = MaintenanceService::new(vec![], &logs, dir.path().join("backups/log"), 6)
            .with_uploader(uploader.clone(), "knowledge");

        let report = service.backup_logs().await.unwrap();

        assert_eq!(report.archived.len(), 1);
        assert!(report.archived[0].uploaded);
        let uploads = uploader.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "knowledge");
        assert!(uploads[0].1.starts_with("backups/log/"));
        assert!(uploads[0].1.ends_with("__app.err.gz"));
    }
}
