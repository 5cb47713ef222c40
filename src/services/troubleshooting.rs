// 故障排查问答
// 无状态：每次调用由客户端带上问题描述和已有回答

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::llm::LlmClient;
use crate::flow::FlowStore;

const SYSTEM_PROMPT: &str =
    "你是维修用车辆的专业技术人员。请通过分步骤的提问进行诊断，并给出安全、具体的处理方法。";

const START_MAX_TOKENS: u32 = 1000;
const ANSWER_MAX_TOKENS: u32 = 1500;
const SOLUTION_MAX_TOKENS: u32 = 2000;
const CONTEXT_LIMIT: usize = 3;

const FALLBACK_START_QUESTION: &str = "请描述发生的具体情况";
const FALLBACK_NEXT_QUESTION: &str = "请告诉我更详细的情况";
const FALLBACK_SOLUTION: &str = "无法生成解决方案，请咨询专家。";
const FALLBACK_EMERGENCY: &str = "需要紧急处理，请立即联系专家。";
const NO_CONTEXT: &str = "无相关信息";

fn default_options() -> Vec<String> {
    ["发动机停止", "制动失灵", "有异常声音", "其他"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 已回答的问题
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QaAnswer {
    #[serde(default)]
    pub step_id: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QaStatus {
    Continue,
    Complete,
    Emergency,
}

/// 问答的一步结果
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QaResponse {
    pub status: QaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl QaResponse {
    fn question(question: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            status: QaStatus::Continue,
            question: Some(question.into()),
            options,
            solution: None,
            emergency_action: None,
            reasoning: None,
        }
    }
}

/// 模型返回的 JSON，字段都可能缺失
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReply {
    status: Option<String>,
    question: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    solution: Option<String>,
    emergency_action: Option<String>,
    reasoning: Option<String>,
}

/// 取第一个 `{` 到最后一个 `}` 之间的内容，兼容代码块包裹
fn parse_reply(content: &str) -> Option<ModelReply> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&content[start..=end]).ok()?;
    serde_json::from_value(value).ok()
}

fn answers_text(answers: &[QaAnswer]) -> String {
    answers
        .iter()
        .enumerate()
        .map(|(i, a)| format!("Q{}: {}", i + 1, a.answer))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct TroubleshootingQa {
    flows: Arc<dyn FlowStore>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl TroubleshootingQa {
    /// 未配置 LLM 时所有调用都返回兜底问题
    pub fn new(flows: Arc<dyn FlowStore>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { flows, llm }
    }

    pub fn is_llm_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// 流程库中相关度最高的几条，作为提示词上下文
    async fn build_context(&self, queries: &[&str]) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut seen: Vec<String> = Vec::new();

        for query in queries.iter().filter(|q| !q.trim().is_empty()) {
            let hits = match self.flows.search(query).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(error = %e, "检索流程失败");
                    continue;
                }
            };
            for flow in hits {
                if lines.len() >= CONTEXT_LIMIT {
                    break;
                }
                if seen.contains(&flow.id) {
                    continue;
                }
                lines.push(format!(
                    "【{}】{}",
                    flow.title,
                    flow.description.clone().unwrap_or_default()
                ));
                seen.push(flow.id);
            }
        }

        if lines.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            lines.join("\n")
        }
    }

    async fn ask(&self, prompt: &str, max_tokens: u32) -> Option<String> {
        let llm = self.llm.as_ref()?;
        match llm.chat(SYSTEM_PROMPT, prompt, max_tokens).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(error = %e, "LLM 调用失败，使用兜底回答");
                None
            }
        }
    }

    /// 根据问题描述生成第一个问题
    #[instrument(skip(self))]
    pub async fn start(&self, problem: &str) -> QaResponse {
        let context = self.build_context(&[problem]).await;
        let prompt = format!(
            "请针对以下问题生成用于分步骤诊断的第一个问题。\n\n\
             问题: {problem}\n相关信息: {context}\n\n\
             要求：优先确认安全；问题应直接有助于缩小原因范围；给出 3 到 5 个具体易懂的选项。\n\
             请只返回如下 JSON：\n\
             {{\"question\": \"问题内容\", \"options\": [\"选项1\", \"选项2\", \"选项3\"], \"reasoning\": \"提问目的\"}}"
        );

        let reply = self
            .ask(&prompt, START_MAX_TOKENS)
            .await
            .as_deref()
            .and_then(parse_reply);
        let Some(reply) = reply else {
            return QaResponse::question(FALLBACK_START_QUESTION, default_options());
        };

        info!("已生成初始问题");
        // 模型未给出可用选项时使用默认选项
        let mut options: Vec<String> = reply
            .options
            .into_iter()
            .filter(|o| !o.trim().is_empty())
            .collect();
        if options.is_empty() {
            options = default_options();
        }
        QaResponse {
            reasoning: reply.reasoning,
            ..QaResponse::question(
                reply
                    .question
                    .filter(|q| !q.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_START_QUESTION.to_string()),
                options,
            )
        }
    }

    /// 根据新回答决定继续提问、给出方案或紧急处理
    #[instrument(skip(self, previous_answers))]
    pub async fn process_answer(
        &self,
        problem: &str,
        previous_answers: &[QaAnswer],
        current_answer: &str,
    ) -> QaResponse {
        let mut answers = previous_answers.to_vec();
        answers.push(QaAnswer {
            step_id: Some(format!("step_{}", Utc::now().timestamp_millis())),
            answer: current_answer.to_string(),
            timestamp: Some(Utc::now()),
        });

        let context = self.build_context(&[problem, current_answer]).await;
        let prompt = format!(
            "请根据以下情况决定下一个问题或解决方案。\n\n\
             最初的问题: {problem}\n目前的回答: {answers}\n相关信息: {context}\n\n\
             信息足够时给出具体解决方案（status=complete）；信息不足时给出下一个问题和选项（status=continue）；\
             存在危险时给出紧急处理指示（status=emergency）。\n\
             请只返回如下 JSON：\n\
             {{\"status\": \"continue|complete|emergency\", \"question\": \"\", \"options\": [], \
             \"solution\": \"\", \"emergencyAction\": \"\", \"reasoning\": \"\"}}",
            answers = answers_text(&answers)
        );

        let reply = self
            .ask(&prompt, ANSWER_MAX_TOKENS)
            .await
            .as_deref()
            .and_then(parse_reply);
        let Some(reply) = reply else {
            return QaResponse::question(FALLBACK_NEXT_QUESTION, Vec::new());
        };

        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match reply.status.as_deref() {
            Some("complete") => QaResponse {
                status: QaStatus::Complete,
                question: None,
                options: Vec::new(),
                solution: Some(
                    non_empty(reply.solution).unwrap_or_else(|| FALLBACK_SOLUTION.to_string()),
                ),
                emergency_action: None,
                reasoning: reply.reasoning,
            },
            Some("emergency") => QaResponse {
                status: QaStatus::Emergency,
                question: None,
                options: Vec::new(),
                solution: None,
                emergency_action: Some(
                    non_empty(reply.emergency_action)
                        .unwrap_or_else(|| FALLBACK_EMERGENCY.to_string()),
                ),
                reasoning: reply.reasoning,
            },
            _ => QaResponse {
                reasoning: reply.reasoning,
                ..QaResponse::question(
                    non_empty(reply.question)
                        .unwrap_or_else(|| FALLBACK_NEXT_QUESTION.to_string()),
                    reply.options,
                )
            },
        }
    }

    /// 汇总全部回答生成最终方案（自由文本）
    #[instrument(skip(self, answers))]
    pub async fn generate_solution(&self, problem: &str, answers: &[QaAnswer]) -> String {
        let prompt = format!(
            "请根据以下回答给出具体的解决方案。\n\n\
             最初的问题: {problem}\n目前的回答: {answers}\n\n\
             请按以下结构回答：问题判定、原因分析、具体处理步骤、安全注意事项、何时需要咨询专家。",
            answers = answers_text(answers)
        );

        self.ask(&prompt, SOLUTION_MAX_TOKENS)
            .await
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_SOLUTION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AssistError, AssistResult};
    use crate::flow::FileFlowStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// 返回固定内容并记录收到的提示词
    struct ScriptedLlm {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _system: &str, user: &str, _max_tokens: u32) -> AssistResult<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.reply
                .clone()
                .ok_or_else(|| AssistError::llm("unavailable"))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn qa(dir: &TempDir, llm: Option<Arc<ScriptedLlm>>) -> TroubleshootingQa {
        let flows: Arc<dyn FlowStore> = Arc::new(FileFlowStore::new(dir.path()));
        TroubleshootingQa::new(flows, llm.map(|l| l as Arc<dyn LlmClient>))
    }

    #[tokio::test]
    async fn test_start_fallback_without_llm() {
        let dir = TempDir::new().unwrap();
        let response = qa(&dir, None).start("发动机停止").await;

        assert_eq!(response.status, QaStatus::Continue);
        assert_eq!(response.question.as_deref(), Some(FALLBACK_START_QUESTION));
        assert_eq!(response.options.len(), 4);
    }

    #[tokio::test]
    async fn test_start_parses_fenced_json_and_uses_flow_context() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("engine.json"),
            serde_json::json!({"id": "engine", "title": "发动机停止", "description": "燃料检查", "steps": []})
                .to_string(),
        )
        .unwrap();
        let llm = ScriptedLlm::new(Some(
            "```json\n{\"question\": \"燃料表显示多少？\", \"options\": [\"空\", \"半箱\", \"满\"], \"reasoning\": \"排除缺油\"}\n```",
        ));

        let response = qa(&dir, Some(llm.clone())).start("发动机停止").await;
        assert_eq!(response.question.as_deref(), Some("燃料表显示多少？"));
        assert_eq!(response.options, vec!["空", "半箱", "满"]);
        assert_eq!(response.reasoning.as_deref(), Some("排除缺油"));

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("【发动机停止】燃料检查"));
    }

    #[tokio::test]
    async fn test_start_empty_options_use_defaults() {
        let dir = TempDir::new().unwrap();
        let llm = ScriptedLlm::new(Some(
            "{\"question\": \"仪表盘有警告灯吗？\", \"options\": [], \"reasoning\": \"确认故障灯\"}",
        ));

        let response = qa(&dir, Some(llm)).start("发动机停止").await;
        assert_eq!(response.question.as_deref(), Some("仪表盘有警告灯吗？"));
        assert_eq!(response.options, default_options());

        let llm = ScriptedLlm::new(Some("{\"question\": \"仪表盘有警告灯吗？\"}"));
        let response = qa(&dir, Some(llm)).start("发动机停止").await;
        assert_eq!(response.options.len(), 4);
    }

    #[tokio::test]
    async fn test_process_answer_statuses() {
        let dir = TempDir::new().unwrap();

        let complete = ScriptedLlm::new(Some(r#"{"status": "complete", "solution": "补充燃料"}"#));
        let response = qa(&dir, Some(complete))
            .process_answer("发动机停止", &[], "燃料为空")
            .await;
        assert_eq!(response.status, QaStatus::Complete);
        assert_eq!(response.solution.as_deref(), Some("补充燃料"));

        let emergency = ScriptedLlm::new(Some(r#"{"status": "emergency"}"#));
        let response = qa(&dir, Some(emergency))
            .process_answer("冒烟", &[], "有火花")
            .await;
        assert_eq!(response.status, QaStatus::Emergency);
        assert_eq!(response.emergency_action.as_deref(), Some(FALLBACK_EMERGENCY));

        let broken = ScriptedLlm::new(Some("not json"));
        let response = qa(&dir, Some(broken))
            .process_answer("异响", &[], "很大")
            .await;
        assert_eq!(response.status, QaStatus::Continue);
        assert_eq!(response.question.as_deref(), Some(FALLBACK_NEXT_QUESTION));
    }

    #[tokio::test]
    async fn test_process_answer_includes_history() {
        let dir = TempDir::new().unwrap();
        let llm = ScriptedLlm::new(Some(r#"{"status": "continue", "question": "电池电压？"}"#));
        let previous = vec![QaAnswer {
            step_id: None,
            answer: "无法启动".to_string(),
            timestamp: None,
        }];

        let response = qa(&dir, Some(llm.clone()))
            .process_answer("发动机停止", &previous, "仪表不亮")
            .await;
        assert_eq!(response.question.as_deref(), Some("电池电压？"));

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("Q1: 无法启动, Q2: 仪表不亮"));
        assert!(prompts[0].contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn test_generate_solution_fallback() {
        let dir = TempDir::new().unwrap();
        let failing = ScriptedLlm::new(None);
        let solution = qa(&dir, Some(failing)).generate_solution("异响", &[]).await;
        assert_eq!(solution, FALLBACK_SOLUTION);
    }
}
