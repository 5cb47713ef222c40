// Blob 存储上传
// 审计日志归档与日志备份共用

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::BlobConfig;
use crate::errors::{AssistError, AssistResult};

const RETRY_BASE_DELAY_MS: u64 = 200;

#[async_trait]
pub trait BlobUploader: Send + Sync {
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> AssistResult<()>;
}

/// Azure Blob REST 上传（SAS 令牌鉴权）
pub struct AzureBlobUploader {
    client: reqwest::Client,
    account_url: Url,
    sas_token: Option<String>,
}

impl AzureBlobUploader {
    /// 未配置账户地址时返回 None
    pub fn from_config(config: &BlobConfig) -> AssistResult<Option<Self>> {
        if !config.is_configured() {
            return Ok(None);
        }
        let raw = config.account_url.as_deref().unwrap_or_default();
        let account_url = Url::parse(raw.trim())
            .map_err(|e| AssistError::configuration(format!("无效的 Blob 账户地址: {}", e)))?;

        Ok(Some(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            account_url,
            sas_token: config
                .sas_token
                .as_ref()
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
        }))
    }

    pub fn blob_url(&self, container: &str, blob_name: &str) -> AssistResult<Url> {
        let mut url = self.account_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AssistError::configuration("Blob 账户地址不能作为基础路径"))?;
            segments.pop_if_empty().push(container);
            segments.extend(blob_name.split('/').filter(|s| !s.is_empty()));
        }
        url.set_query(self.sas_token.as_deref());
        Ok(url)
    }
}

#[async_trait]
impl BlobUploader for AzureBlobUploader {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn upload(
        &self,
        container: &str,
        blob_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> AssistResult<()> {
        let url = self.blob_url(container, blob_name)?;
        let response = self
            .client
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistError::external_service(
                "blob",
                format!("上传失败 ({}): {}", status, body),
            ));
        }
        debug!(container = %container, blob = %blob_name, "Blob 上传完成");
        Ok(())
    }
}

/// 失败后按递增间隔重试，最多 attempts 次
pub async fn upload_with_retry(
    uploader: &dyn BlobUploader,
    container: &str,
    blob_name: &str,
    data: &[u8],
    content_type: &str,
    attempts: u32,
) -> AssistResult<()> {
    let attempts = attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match uploader
            .upload(container, blob_name, data.to_vec(), content_type)
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(blob = %blob_name, attempt, error = %e, "Blob 上传失败");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(
                        RETRY_BASE_DELAY_MS * u64::from(attempt),
                    ))
                    .await;
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| AssistError::internal("Blob 上传未执行")))
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::RecordingUploader;
    use super::*;

    fn blob_config(url: &str, sas: Option<&str>) -> BlobConfig {
        BlobConfig {
            account_url: Some(url.to_string()),
            sas_token: sas.map(str::to_string),
            knowledge_container: "knowledge".to_string(),
            upload_retries: 3,
        }
    }

    #[test]
    fn test_blob_url() {
        let uploader = AzureBlobUploader::from_config(&blob_config(
            "https://acct.blob.core.windows.net/",
            Some("?sv=2024&sig=abc"),
        ))
        .unwrap()
        .unwrap();

        let url = uploader
            .blob_url("audit-logs", "userlog/audit-2024.log.gz")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/audit-logs/userlog/audit-2024.log.gz?sv=2024&sig=abc"
        );
    }

    #[test]
    fn test_unconfigured_blob_is_disabled() {
        let mut config = blob_config("", None);
        config.account_url = None;
        assert!(AzureBlobUploader::from_config(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_retries_until_success() {
        let uploader = RecordingUploader {
            fail_times: 2,
            ..Default::default()
        };

        upload_with_retry(&uploader, "c", "a.gz", b"data", "application/gzip", 3)
            .await
            .unwrap();
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 3);
        assert_eq!(uploader.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_gives_up_after_attempts() {
        let uploader = RecordingUploader {
            fail_times: 10,
            ..Default::default()
        };

        let result =
            upload_with_retry(&uploader, "c", "a.gz", b"data", "application/gzip", 2).await;
        assert!(result.is_err());
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 2);
    }
}
