//! Planner：一次模型调用生成完整计划
//!
//! 把任务与工具目录拼成 prompt，按计划 schema 调用结构化接口，逐项校验：
//! 不合法的步骤静默丢弃，只有结果为空时才视为规划失败。

use std::sync::Arc;

use serde_json::Value;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::step::{plan_schema, Step};
use crate::tools::{render_catalog, ToolDescriptor};

const DEFAULT_PLANNER_PROMPT: &str = "You are a planning agent. Break the user's task into an ordered list of tool invocations. \
Each step must name one of the available tools in \"action\", give its arguments as a JSON object in \"parameters\", \
and explain in \"reason\" why the step is needed. Use a \"query\" parameter when the tool benefits from earlier results.";

/// 计划生成器：持有 LLM 与 system prompt
pub struct PlanGenerator {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: DEFAULT_PLANNER_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn build_messages(&self, task: &str, catalog: &[ToolDescriptor]) -> Vec<Message> {
        let tools = if catalog.is_empty() {
            "(no tools registered)".to_string()
        } else {
            render_catalog(catalog)
        };
        vec![
            Message::system(format!("{}\n\nAvailable tools:\n{}", self.system_prompt, tools)),
            Message::user(format!(
                "Given the task: {}\nGenerate a step-by-step plan in JSON format.",
                task
            )),
        ]
    }

    /// 生成计划；模型失败或没有任何合法步骤时返回 PlanningFailure
    pub async fn generate(
        &self,
        task: &str,
        catalog: &[ToolDescriptor],
    ) -> Result<Vec<Step>, AgentError> {
        let messages = self.build_messages(task, catalog);
        let raw = self
            .llm
            .complete_structured(&messages, &plan_schema())
            .await
            .map_err(|e| AgentError::PlanningFailure(format!("model call failed: {}", e)))?;

        let steps = parse_plan(&raw);
        if steps.is_empty() {
            return Err(AgentError::PlanningFailure(
                "Failed to generate valid execution plan".to_string(),
            ));
        }
        tracing::debug!("Planned {} steps for task", steps.len());
        Ok(steps)
    }
}

/// 从模型输出中取出合法步骤：接受步骤数组，或带 `steps` / `plan` 数组字段的对象
pub fn parse_plan(raw: &Value) -> Vec<Step> {
    let items = match raw {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("steps").or_else(|| obj.get("plan")) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => std::slice::from_ref(raw),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match Step::from_value(item) {
            Ok(step) => Some(step),
            Err(e) => {
                tracing::warn!("Dropping step: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use serde_json::json;

    fn catalog() -> Vec<ToolDescriptor> {
        vec![ToolDescriptor {
            name: "get_current_weather".into(),
            description: "Get the current weather in a given location".into(),
            parameters: json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            }),
        }]
    }

    #[test]
    fn test_parse_plan_drops_invalid_steps() {
        let raw = json!([
            {"action": "get_current_weather", "parameters": {"location": "Tokyo"}, "reason": "weather"},
            {"action": "get_current_weather", "reason": "no parameters"},
            {"parameters": {}, "reason": "no action"},
            {"action": "echo", "parameters": {}, "reason": "summarize"}
        ]);
        let steps = parse_plan(&raw);
        let actions: Vec<&str> = steps.iter().map(|s| s.action()).collect();
        assert_eq!(actions, vec!["get_current_weather", "echo"]);
    }

    #[test]
    fn test_parse_plan_accepts_wrapped_steps() {
        let raw = json!({"steps": [{"action": "echo", "parameters": {}, "reason": "r"}]});
        assert_eq!(parse_plan(&raw).len(), 1);
        let single = json!({"action": "echo", "parameters": {}, "reason": "r"});
        assert_eq!(parse_plan(&single).len(), 1);
        assert!(parse_plan(&json!("text")).is_empty());
    }

    #[tokio::test]
    async fn test_generate_includes_catalog_in_prompt() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"[{"action": "get_current_weather", "parameters": {"location": "Tokyo"}, "reason": "asked"}]"#,
        ]));
        let planner = PlanGenerator::new(llm.clone());
        let steps = planner
            .generate("What's the weather in Tokyo?", &catalog())
            .await
            .unwrap();
        assert_eq!(steps.len(), 1);
        let prompt = &llm.prompts()[0];
        assert!(prompt[0]
            .content
            .contains("- get_current_weather: Get the current weather in a given location"));
        assert!(prompt[0].content.contains(r#""required":["location"]"#));
        assert!(prompt[1].content.contains("What's the weather in Tokyo?"));
    }

    #[tokio::test]
    async fn test_all_invalid_is_planning_failure() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"[{"action": "x"}]"#]));
        let err = PlanGenerator::new(llm).generate("t", &catalog()).await.unwrap_err();
        assert!(matches!(err, AgentError::PlanningFailure(_)));
    }

    #[tokio::test]
    async fn test_model_error_is_planning_failure() {
        let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
        let err = PlanGenerator::new(llm).generate("t", &catalog()).await.unwrap_err();
        assert!(matches!(err, AgentError::PlanningFailure(_)));
    }
}
