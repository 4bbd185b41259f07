//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient：complete（自由文本）与 complete_structured（按 schema 返回 JSON）。

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::Message;

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回文本
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 结构化完成：默认把 schema 追加为 system 约束，调用 complete 后从文本中提取 JSON
    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &Value,
    ) -> Result<Value, String> {
        let schema_str = serde_json::to_string_pretty(schema).map_err(|e| e.to_string())?;
        let mut full = messages.to_vec();
        full.push(Message::system(format!(
            "Respond with JSON only. The output must conform to this JSON schema:\n{}",
            schema_str
        )));
        let text = self.complete(&full).await?;
        extract_json(&text)
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 从模型文本中提取 JSON：优先 ```json 代码块，其次最外层的 [...] 或 {...}
pub fn extract_json(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();

    let candidate = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        outermost_span(trimmed).unwrap_or(trimmed)
    };

    serde_json::from_str(candidate).map_err(|e| format!("{}: {}", e, candidate))
}

/// 取最早出现的 `[` 或 `{` 到与之同类的最后一个闭合符之间的文本
fn outermost_span(text: &str) -> Option<&str> {
    let open = text.find(['[', '{'])?;
    let close_char = if text[open..].starts_with('[') { ']' } else { '}' };
    let close = text.rfind(close_char)?;
    (close > open).then(|| &text[open..=close])
}
