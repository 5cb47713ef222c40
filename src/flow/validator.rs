//! 流程图结构校验
//!
//! 校验顺序：开始节点、结束节点、孤立节点（仅警告）、循环引用。
//! 不存在的连接目标按叶子节点处理。

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};
use tracing::debug;

use super::model::{FlowNode, FlowValidation, NodeType};

pub const MSG_MISSING_START: &str = "缺少开始节点";
pub const MSG_MULTIPLE_START: &str = "开始节点只能有一个";
pub const MSG_MISSING_END: &str = "缺少结束节点";
pub const MSG_CYCLE: &str = "流程中检测到循环引用";

pub fn orphan_warning(name: &str) -> String {
    format!("节点 \"{}\" 未被其他节点连接", name)
}

pub fn validate_flow(nodes: &[FlowNode]) -> FlowValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let start_count = nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Start)
        .count();
    match start_count {
        0 => errors.push(MSG_MISSING_START.to_string()),
        1 => {}
        _ => errors.push(MSG_MULTIPLE_START.to_string()),
    }

    if !nodes.iter().any(|n| n.node_type == NodeType::End) {
        errors.push(MSG_MISSING_END.to_string());
    }

    // 自环也算被连接
    let targets: HashSet<&str> = nodes
        .iter()
        .flat_map(|n| n.connections.iter().map(String::as_str))
        .collect();
    for node in nodes {
        if node.node_type != NodeType::Start && !targets.contains(node.id.as_str()) {
            warnings.push(orphan_warning(node.display_name()));
        }
    }

    if detect_cycle(nodes) {
        errors.push(MSG_CYCLE.to_string());
    }

    debug!(
        nodes = nodes.len(),
        errors = errors.len(),
        warnings = warnings.len(),
        "流程校验完成"
    );

    FlowValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// 深度优先遍历，回到当前递归栈上的节点即为环
pub fn detect_cycle(nodes: &[FlowNode]) -> bool {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        index.entry(node.id.as_str()).or_insert(i);
    }

    let mut visited = vec![false; nodes.len()];
    let mut on_stack = vec![false; nodes.len()];

    for root in 0..nodes.len() {
        if visited[root] {
            continue;
        }

        // (节点下标, 下一个待访问的连接下标)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        visited[root] = true;
        on_stack[root] = true;

        while let Some(&(current, next)) = stack.last() {
            let connections = &nodes[current].connections;
            if next >= connections.len() {
                on_stack[current] = false;
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            let Some(&target) = index.get(connections[next].as_str()) else {
                continue;
            };
            if on_stack[target] {
                return true;
            }
            if !visited[target] {
                visited[target] = true;
                on_stack[target] = true;
                stack.push((target, 0));
            }
        }
    }

    false
}

/// 校验流程文档中的 steps；缺失时视为空列表
pub fn validate_flow_data(document: &Value) -> FlowValidation {
    let nodes: Vec<FlowNode> = document
        .get("steps")
        .and_then(Value::as_array)
        .map(|steps| steps.iter().filter_map(node_from_value).collect())
        .unwrap_or_default();
    validate_flow(&nodes)
}

/// 校验通过时原样返回，否则只保证 steps 数组存在
pub fn auto_fix_flow_data(document: &Value) -> Value {
    if validate_flow_data(document).is_valid {
        return document.clone();
    }

    let mut fixed = match document {
        Value::Object(_) => document.clone(),
        _ => json!({}),
    };
    if let Some(obj) = fixed.as_object_mut() {
        let has_steps = obj.get("steps").map(Value::is_array).unwrap_or(false);
        if !has_steps {
            obj.insert("steps".to_string(), Value::Array(Vec::new()));
        }
    }
    fixed
}

/// 宽松地从 JSON 步骤中提取节点，不要求完整的步骤结构
fn node_from_value(step: &Value) -> Option<FlowNode> {
    let obj = step.as_object()?;

    let id = obj.get("id").map(id_string).unwrap_or_default();
    let node_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(|t| NodeType::from(t.to_string()))
        .unwrap_or_default();
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut connections: Vec<String> = obj
        .get("connections")
        .and_then(Value::as_array)
        .map(|c| c.iter().map(id_string).collect())
        .unwrap_or_default();
    if let Some(options) = obj.get("options").and_then(Value::as_array) {
        connections.extend(
            options
                .iter()
                .filter_map(|o| o.get("nextStepId"))
                .map(id_string)
                .filter(|id| !id.is_empty()),
        );
    }

    Some(FlowNode {
        id,
        node_type,
        title,
        connections,
    })
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
