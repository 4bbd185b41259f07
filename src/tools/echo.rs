//! Echo 工具：诊断用，原样返回 text 参数

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolInput};

pub struct EchoTool;

static OUTPUT_SCHEMA: std::sync::OnceLock<Value> = std::sync::OnceLock::new();

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the given text unchanged."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    fn output_schema(&self) -> Option<&Value> {
        Some(OUTPUT_SCHEMA.get_or_init(|| serde_json::json!({ "type": "string" })))
    }

    async fn execute(&self, input: ToolInput) -> Result<Value, String> {
        let text = input.param_str("text").unwrap_or("(empty)");
        Ok(Value::String(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::validate_against_schema;
    use serde_json::json;

    #[tokio::test]
    async fn test_echo_output_matches_schema() {
        let input = ToolInput::new(json!({"text": "hi"}).as_object().cloned().unwrap());
        let out = EchoTool.execute(input).await.unwrap();
        assert_eq!(out, json!("hi"));
        assert!(validate_against_schema(EchoTool.output_schema().unwrap(), &out).is_ok());

        let out = EchoTool.execute(ToolInput::default()).await.unwrap();
        assert_eq!(out, json!("(empty)"));
    }
}
