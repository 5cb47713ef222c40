// 故障排查流程数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// 图片接口前缀，存储时去掉，读取时补上
pub const IMAGE_URL_PREFIX: &str = "/api/emergency-flow/image/";

/// 节点类型
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Start,
    #[default]
    Step,
    Decision,
    Condition,
    End,
    /// 前端新增的未知类型，原样保留
    Other(String),
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "start" => Self::Start,
            "step" => Self::Step,
            "decision" => Self::Decision,
            "condition" => Self::Condition,
            "end" => Self::End,
            _ => Self::Other(value),
        }
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Start => "start".to_string(),
            NodeType::Step => "step".to_string(),
            NodeType::Decision => "decision".to_string(),
            NodeType::Condition => "condition".to_string(),
            NodeType::End => "end".to_string(),
            NodeType::Other(other) => other,
        }
    }
}

/// 校验器的输入节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlowNode {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub node_type: NodeType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub connections: Vec<String>,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, connections: &[&str]) -> Self {
        Self {
            id: id.into(),
            node_type,
            title: None,
            connections: connections.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// 警告信息中使用的名称
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// 步骤中的选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepOption {
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_opt_id", skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
    #[serde(default)]
    pub is_terminal: bool,
    /// yes / no / other
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_type: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

/// 流程步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    #[schema(value_type = String)]
    pub step_type: NodeType,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_ids", skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<StepOption>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl FlowStep {
    /// 显式连接加上各选项的 nextStepId
    pub fn outgoing(&self) -> Vec<String> {
        let mut targets = self.connections.clone();
        targets.extend(
            self.options
                .iter()
                .filter_map(|o| o.next_step_id.clone())
                .filter(|id| !id.is_empty()),
        );
        targets
    }

    pub fn to_node(&self) -> FlowNode {
        FlowNode {
            id: self.id.clone(),
            node_type: self.step_type.clone(),
            title: Some(self.title.clone()),
            connections: self.outgoing(),
        }
    }
}

/// 完整的流程文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowDocument {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl FlowDocument {
    pub fn nodes(&self) -> Vec<FlowNode> {
        self.steps.iter().map(FlowStep::to_node).collect()
    }

    /// 标题、描述、关键字的不区分大小写匹配
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        [Some(&self.title), self.description.as_ref(), self.keyword.as_ref()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&query))
    }

    /// 列表摘要；描述缺失时使用第一个步骤的描述或消息
    pub fn summary(&self) -> FlowSummary {
        let description = self
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| {
                self.steps
                    .first()
                    .and_then(|s| s.description.clone().or_else(|| s.message.clone()))
            })
            .unwrap_or_default();

        FlowSummary {
            id: self.id.clone(),
            title: if self.title.is_empty() {
                "无标题".to_string()
            } else {
                self.title.clone()
            },
            description,
            keyword: self.keyword.clone(),
            step_count: self.steps.len(),
            category: self
                .extra
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// 写入存储前去掉图片接口前缀
    pub fn normalize_image_urls(&mut self) {
        for step in &mut self.steps {
            if let Some(url) = step.image_url.as_mut() {
                if let Some(stripped) = url.strip_prefix(IMAGE_URL_PREFIX) {
                    *url = stripped.to_string();
                }
            }
        }
    }

    /// 读取后把文件名还原为可访问的接口地址
    pub fn expand_image_urls(&mut self) {
        for step in &mut self.steps {
            if let Some(url) = step.image_url.as_mut() {
                *url = expand_image_url(url);
            }
        }
    }
}

pub fn expand_image_url(url: &str) -> String {
    if url.is_empty()
        || url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with(IMAGE_URL_PREFIX)
    {
        url.to_string()
    } else {
        format!("{}{}", IMAGE_URL_PREFIX, url.trim_start_matches('/'))
    }
}

/// 流程列表项
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub step_count: usize,
    pub category: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// 前端生成的 id 可能是数字
fn id_from_value(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(format!("无效的 id: {}", other)),
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    id_from_value(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn lenient_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let id = id_from_value(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)?;
    Ok(Some(id).filter(|s| !s.is_empty()))
}

fn lenient_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|v| id_from_value(v).map_err(serde::de::Error::custom))
            .collect(),
        other => Err(serde::de::Error::custom(format!("connections 必须是数组: {}", other))),
    }
}
