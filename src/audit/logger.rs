// 审计日志队列
// 请求中间件入队，后台任务定期以 JSON 行追加写入文件

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::errors::AssistResult;

const MASK: &str = "***";

/// 单条审计记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub tag: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub ms: u64,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub ip: Option<String>,
    pub ua: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub request_id: String,
    pub correlation_id: String,
}

pub struct AuditLogger {
    queue: Mutex<Vec<AuditEntry>>,
    log_file: PathBuf,
    tag: String,
    mask_keys: Vec<String>,
    /// 目录不可用时为 false，记录改走 tracing
    file_enabled: bool,
    /// 串行化写入与轮转改名
    file_lock: tokio::sync::Mutex<()>,
}

impl AuditLogger {
    pub fn new(config: &AuditConfig) -> Self {
        let file_enabled = match std::fs::create_dir_all(&config.log_dir) {
            Ok(()) => true,
            Err(e) => {
                warn!(dir = %config.log_dir, error = %e, "无法创建审计日志目录，改为输出到控制台");
                false
            }
        };

        Self {
            queue: Mutex::new(Vec::new()),
            log_file: config.log_file(),
            tag: config.tag.clone(),
            mask_keys: config.mask_keys.iter().map(|k| k.to_lowercase()).collect(),
            file_enabled,
            file_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_file_enabled(&self) -> bool {
        self.file_enabled
    }

    /// 按配置的键名屏蔽请求体
    pub fn mask(&self, body: &Value) -> Value {
        mask_value(body, &self.mask_keys)
    }

    pub fn enqueue(&self, entry: AuditEntry) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push(entry);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 立即写出队列中的记录，返回写出的条数
    pub async fn flush(&self) -> AssistResult<usize> {
        let _guard = self.file_lock.lock().await;
        self.flush_locked().await
    }

    /// 调用方已持有文件锁
    pub(crate) async fn flush_locked(&self) -> AssistResult<usize> {
        let entries: Vec<AuditEntry> = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *queue)
        };
        if entries.is_empty() {
            return Ok(0);
        }

        if !self.file_enabled {
            for entry in &entries {
                let line = serde_json::to_string(entry)?;
                info!(target: "audit", entry = %line, "审计");
            }
            return Ok(entries.len());
        }

        let mut buffer = String::new();
        for entry in &entries {
            buffer.push_str(&serde_json::to_string(entry)?);
            buffer.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        debug!(count = entries.len(), "审计日志已写入");
        Ok(entries.len())
    }

    pub(crate) async fn lock_file(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.file_lock.lock().await
    }

    /// 启动定时写出任务
    pub fn spawn_flush_task(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.flush().await {
                    warn!(error = %e, "审计日志写入失败");
                }
            }
        })
    }
}

/// 任意深度的对象键名匹配时替换为 ***
pub fn mask_value(value: &Value, keys: &[String]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let masked = if keys.iter().any(|key| key.eq_ignore_ascii_case(k)) {
                        Value::String(MASK.to_string())
                    } else {
                        mask_value(v, keys)
                    };
                    (k.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| mask_value(v, keys)).collect()),
        other => other.clone(),
    }
}
