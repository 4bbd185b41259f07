//! 工具请求 / 响应信封

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::memory::MemoryRecord;

/// 工具输入：步骤参数 + 从记忆检索到的上下文 + 可选用户 ID
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    pub parameters: Map<String, Value>,
    pub context: Vec<MemoryRecord>,
    pub user_id: Option<String>,
}

impl ToolInput {
    pub fn new(parameters: Map<String, Value>) -> Self {
        Self {
            parameters,
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: Vec<MemoryRecord>) -> Self {
        self.context = context;
        self
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }
}

/// 结构化错误：`{error, exception}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub error: String,
    pub exception: String,
}

impl ToolFailure {
    pub fn new(error: impl Into<String>, exception: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            exception: exception.into(),
        }
    }

    /// 工具解析类错误（不重试）：error 为错误描述，exception 为错误类别
    pub fn from_agent_error(err: &AgentError) -> Self {
        Self::new(err.to_string(), err.kind())
    }
}

/// 工具结果：成功载荷或结构化错误；离开 Dispatcher 后不会再以错误形式抛出
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    Success(Value),
    Failed(ToolFailure),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&ToolFailure> {
        match self {
            ToolOutcome::Failed(f) => Some(f),
            ToolOutcome::Success(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// 人类可读形式，用于 ReAct 的观察消息
    pub fn render(&self) -> String {
        match self {
            ToolOutcome::Success(Value::String(s)) => s.clone(),
            ToolOutcome::Success(v) => v.to_string(),
            ToolOutcome::Failed(f) => format!("{} ({})", f.error, f.exception),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_as_error_object() {
        let outcome = ToolOutcome::Failed(ToolFailure::new("Failed after 2 retries", "boom"));
        assert_eq!(
            outcome.to_value(),
            serde_json::json!({"error": "Failed after 2 retries", "exception": "boom"})
        );
        assert!(outcome.is_error());
    }

    #[test]
    fn test_success_serializes_payload() {
        let outcome = ToolOutcome::Success(serde_json::json!({"temp": 72}));
        assert_eq!(outcome.to_value(), serde_json::json!({"temp": 72}));
        assert_eq!(ToolOutcome::Success("hi".into()).render(), "hi");
    }
}
