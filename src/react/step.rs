//! 计划步骤与步骤校验
//!
//! Step 只能经由校验构造：action 与 reason 为非空字符串、parameters 为对象（可为空）。
//! 校验不检查工具是否存在或是否被允许，那是 Dispatcher 的职责。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;

/// 已校验的计划步骤
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StepFormat")]
pub struct Step {
    action: String,
    parameters: Map<String, Value>,
    reason: String,
}

/// 模型输出中的单个步骤格式（仅用于 Schema 生成与反序列化）
#[derive(Debug, Deserialize, JsonSchema)]
struct StepFormat {
    /// 工具名
    action: String,
    /// 工具参数
    parameters: Map<String, Value>,
    /// 选择该工具的理由
    reason: String,
}

impl TryFrom<StepFormat> for Step {
    type Error = AgentError;

    fn try_from(raw: StepFormat) -> Result<Self, Self::Error> {
        Step::new(raw.action, raw.parameters, raw.reason)
    }
}

impl Step {
    pub fn new(
        action: impl Into<String>,
        parameters: Map<String, Value>,
        reason: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let action = action.into();
        let reason = reason.into();
        if action.trim().is_empty() {
            return Err(AgentError::StepShapeInvalid("action is empty".to_string()));
        }
        if reason.trim().is_empty() {
            return Err(AgentError::StepShapeInvalid(format!(
                "reason is empty for action '{}'",
                action
            )));
        }
        Ok(Self {
            action: action.trim().to_string(),
            parameters,
            reason,
        })
    }

    /// 从松散 JSON 校验并构造
    pub fn from_value(value: &Value) -> Result<Self, AgentError> {
        let obj = value
            .as_object()
            .ok_or_else(|| AgentError::StepShapeInvalid(format!("not an object: {}", value)))?;
        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::StepShapeInvalid(format!("missing action: {}", value)))?;
        let parameters = obj
            .get("parameters")
            .and_then(Value::as_object)
            .ok_or_else(|| AgentError::StepShapeInvalid(format!("missing parameters: {}", value)))?;
        let reason = obj
            .get("reason")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::StepShapeInvalid(format!("missing reason: {}", value)))?;
        Step::new(action, parameters.clone(), reason)
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// 步骤校验谓词
pub fn is_valid_step(value: &Value) -> bool {
    Step::from_value(value).is_ok()
}

/// 计划（步骤数组）的 JSON Schema，用于结构化模型调用
pub fn plan_schema() -> Value {
    let schema = schema_for!(Vec<StepFormat>);
    serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "action": {"type": "string"},
                    "parameters": {"type": "object"},
                    "reason": {"type": "string"}
                },
                "required": ["action", "parameters", "reason"]
            }
        })
    })
}
