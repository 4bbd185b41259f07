//! Mock / Scripted LLM 客户端（无需 API）
//!
//! - MockLlmClient：离线回显，计划模式返回一步 echo，ReAct 模式直接给出 Final Answer。
//! - ScriptedLlmClient：按顺序回放预设回复并记录每次收到的消息，便于测试断言 prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        Ok(format!(
            "Thought: echoing the request\nFinal Answer: Echo from Mock: {}",
            last_user(messages)
        ))
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        _schema: &Value,
    ) -> Result<Value, String> {
        Ok(serde_json::json!([{
            "action": "echo",
            "parameters": {"text": format!("Echo from Mock: {}", last_user(messages))},
            "reason": "Mock planner echoes the task"
        }]))
    }
}

/// 预设回复
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Error(String),
}

/// 脚本化客户端：依次返回预设回复，耗尽后返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| ScriptedReply::Text(r.into()))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.lock_replies().push_back(ScriptedReply::Text(text.into()));
    }

    pub fn push_error(&self, error: impl Into<String>) {
        self.lock_replies().push_back(ScriptedReply::Error(error.into()));
    }

    /// 每次调用收到的完整消息列表
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptedReply>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());
        match self.lock_replies().pop_front() {
            Some(ScriptedReply::Text(t)) => Ok(t),
            Some(ScriptedReply::Error(e)) => Err(e),
            None => Err("scripted replies exhausted".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let llm = ScriptedLlmClient::new(["one", "two"]);
        llm.push_error("rate limited");
        assert_eq!(llm.complete(&[Message::user("a")]).await.unwrap(), "one");
        assert_eq!(llm.complete(&[Message::user("b")]).await.unwrap(), "two");
        assert_eq!(llm.complete(&[]).await.unwrap_err(), "rate limited");
        assert!(llm.complete(&[]).await.is_err());
        assert_eq!(llm.call_count(), 4);
        assert_eq!(llm.prompts()[1][0].content, "b");
    }

    #[tokio::test]
    async fn test_structured_default_extracts_json() {
        let llm = ScriptedLlmClient::new(["```json\n[{\"action\": \"echo\"}]\n```"]);
        let v = llm
            .complete_structured(&[Message::user("plan")], &serde_json::json!({"type": "array"}))
            .await
            .unwrap();
        assert_eq!(v[0]["action"], "echo");
        let prompt = &llm.prompts()[0];
        assert!(prompt.last().unwrap().content.contains("JSON schema"));
    }

    #[tokio::test]
    async fn test_mock_plans_an_echo_step() {
        let v = MockLlmClient
            .complete_structured(&[Message::user("hello")], &Value::Null)
            .await
            .unwrap();
        assert_eq!(v[0]["action"], "echo");
        assert_eq!(v[0]["parameters"]["text"], "Echo from Mock: hello");
    }
}
