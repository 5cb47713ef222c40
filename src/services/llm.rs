// LLM 客户端
// OpenAI 兼容的 chat/completions 接口

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::AiConfig;
use crate::errors::{AssistError, AssistResult};

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 单轮对话，返回模型输出的文本
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> AssistResult<String>;

    fn model(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 客户端实现
pub struct OpenAiChatClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatClient {
    pub fn new(config: &AiConfig) -> AssistResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| AssistError::configuration(format!("无效的 API 密钥: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    #[instrument(skip(self, system, user), fields(model = %self.model))]
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> AssistResult<String> {
        debug!(prompt_len = user.len(), "调用 LLM");

        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "max_tokens": max_tokens,
            "temperature": self.temperature
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AssistError::llm_with_model(format!("请求失败: {}", e), &self.model))?;

        // 限流与过载单独区分
        if matches!(response.status().as_u16(), 429 | 503) {
            return Err(AssistError::service_unavailable(format!(
                "LLM 服务繁忙 ({})",
                response.status()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistError::llm_with_model(
                format!("接口返回 {}: {}", status, error_text),
                &self.model,
            ));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AssistError::llm_with_model(format!("解析响应失败: {}", e), &self.model))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AssistError::llm_with_model("响应中没有内容", &self.model))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
