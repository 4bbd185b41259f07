//! ReAct 文本解析
//!
//! 模型回复由带冒号的标记分段：`Thought:` / `Action:` / `Action Input:` / `Final Answer:`。
//! - Thought 取最后一段，止于下一个任意标记；
//! - Action 取第一段首个词；
//! - Action Input 取第一段，止于下一个 Thought 或 Final Answer（输入里可以出现 "Action" 字样）；
//! - Final Answer 取第一段直到文本末尾。
//!
//! 空白片段视为缺失。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::AgentError;

static MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn marker_re() -> &'static Regex {
    // "Action Input" 必须排在 "Action" 之前，交替分支按书写顺序优先
    MARKER_RE.get_or_init(|| {
        Regex::new(r"(Thought|Action Input|Action|Final Answer)\s*:")
            .expect("react marker pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Thought,
    Action,
    ActionInput,
    FinalAnswer,
}

struct Section {
    marker: Marker,
    /// 标记本身起始位置
    start: usize,
    /// 内容起始位置（冒号之后）
    body: usize,
}

/// 一次模型回复的解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactParse {
    pub thought: Option<String>,
    pub action: Option<String>,
    pub action_input: Option<String>,
    pub final_answer: Option<String>,
}

impl ReactParse {
    /// 把 Action Input 解析为参数对象；缺失、非 JSON 或非对象时返回错误说明
    pub fn parameters(&self) -> Result<Map<String, Value>, AgentError> {
        let raw = self
            .action_input
            .as_deref()
            .ok_or_else(|| AgentError::StepShapeInvalid("missing Action Input".to_string()))?;
        let cleaned = strip_code_fence(raw);
        match serde_json::from_str::<Value>(cleaned) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(AgentError::JsonParseError(format!(
                "Action Input must be a JSON object, got {}",
                other
            ))),
            Err(e) => Err(AgentError::JsonParseError(format!(
                "Action Input is not valid JSON: {}",
                e
            ))),
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// 解析 ReAct 格式回复
pub fn parse_react_output(text: &str) -> ReactParse {
    let sections: Vec<Section> = marker_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let marker = match caps.get(1)?.as_str() {
                "Thought" => Marker::Thought,
                "Action Input" => Marker::ActionInput,
                "Action" => Marker::Action,
                _ => Marker::FinalAnswer,
            };
            Some(Section {
                marker,
                start: whole.start(),
                body: whole.end(),
            })
        })
        .collect();

    // 从第 idx 段之后找第一个满足条件的标记作为结束位置
    let end_of = |idx: usize, stops: &dyn Fn(Marker) -> bool| -> usize {
        sections[idx + 1..]
            .iter()
            .find(|s| stops(s.marker))
            .map(|s| s.start)
            .unwrap_or(text.len())
    };

    let mut parsed = ReactParse::default();

    if let Some(idx) = sections.iter().rposition(|s| s.marker == Marker::Thought) {
        let end = end_of(idx, &|_| true);
        parsed.thought = non_empty(&text[sections[idx].body..end]);
    }

    if let Some(idx) = sections.iter().position(|s| s.marker == Marker::Action) {
        let end = end_of(idx, &|_| true);
        parsed.action = text[sections[idx].body..end]
            .split_whitespace()
            .next()
            .map(str::to_string);
    }

    if let Some(idx) = sections.iter().position(|s| s.marker == Marker::ActionInput) {
        let end = end_of(idx, &|m| matches!(m, Marker::Thought | Marker::FinalAnswer));
        parsed.action_input = non_empty(&text[sections[idx].body..end]);
    }

    if let Some(idx) = sections.iter().position(|s| s.marker == Marker::FinalAnswer) {
        parsed.final_answer = non_empty(&text[sections[idx].body..]);
    }

    parsed
}
