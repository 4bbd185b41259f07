//! Reflector：执行结束后对完整结果序列做一次反思
//!
//! 持有 LLM 与 prompt 模板；模板中 `{task}` 与 `{results}` 会被替换。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::ToolOutcome;

pub const DEFAULT_REFLECTION_TEMPLATE: &str = "Analyze this execution trace for the task \"{task}\" and suggest improvements:
{results}

Consider:
- Tool selection effectiveness
- Parameter tuning
- Error patterns
- Alternative approaches";

pub struct Reflector {
    llm: Arc<dyn LlmClient>,
    prompt_template: String,
}

impl Reflector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompt_template: DEFAULT_REFLECTION_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn build_prompt(&self, task: &str, results: &[ToolOutcome]) -> String {
        let rendered = serde_json::to_string_pretty(results).unwrap_or_else(|_| {
            results
                .iter()
                .map(ToolOutcome::render)
                .collect::<Vec<_>>()
                .join("\n")
        });
        self.prompt_template
            .replace("{task}", task)
            .replace("{results}", &rendered)
    }

    pub async fn reflect(&self, task: &str, results: &[ToolOutcome]) -> Result<String, AgentError> {
        let prompt = self.build_prompt(task, results);
        let response = self
            .llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(AgentError::LlmError)?;
        Ok(response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::ToolFailure;
    use serde_json::json;

    #[tokio::test]
    async fn test_prompt_contains_every_result() {
        let llm = Arc::new(ScriptedLlmClient::new(["  use a better tool  "]));
        let reflector = Reflector::new(llm.clone());
        let results = vec![
            ToolOutcome::Success(json!({"temp": 21})),
            ToolOutcome::Failed(ToolFailure::new("Failed after 3 retries", "boom")),
        ];
        let text = reflector.reflect("weather", &results).await.unwrap();
        assert_eq!(text, "use a better tool");

        let prompt = &llm.prompts()[0][0].content;
        assert!(prompt.contains("\"weather\""));
        assert!(prompt.contains("\"temp\": 21"));
        assert!(prompt.contains("Failed after 3 retries"));
    }

    #[test]
    fn test_custom_template() {
        let reflector = Reflector::new(Arc::new(ScriptedLlmClient::default()))
            .with_template("T={task}");
        assert_eq!(reflector.build_prompt("x", &[]), "T=x");
    }
}
