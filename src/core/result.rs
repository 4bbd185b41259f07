//! 结构化结果：一次运行唯一对外可见的输出

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::AgentConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// 秒
    pub execution_time: f64,
    pub steps_executed: usize,
    pub agent_config: AgentConfig,
}

/// `{success, data, errors, metadata}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub success: bool,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub metadata: RunMetadata,
}

impl StructuredResult {
    pub fn results(&self) -> &[Value] {
        self.data
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.data.get("final_answer").and_then(Value::as_str)
    }

    pub fn reflection(&self) -> Option<&str> {
        self.data.get("reflection").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
