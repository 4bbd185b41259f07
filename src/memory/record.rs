//! 记忆记录：一次交互的带时间戳条目

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 记录类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    TaskStart,
    Step,
    Reflection,
    TaskEnd,
}

/// 单条记忆：`{kind, content, timestamp}`，插入顺序即新旧顺序
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub kind: RecordKind,
    pub content: Value,
    /// Unix 秒（含小数）
    pub timestamp: f64,
}

impl MemoryRecord {
    pub fn new(kind: RecordKind, content: impl Into<Value>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: now_secs(),
        }
    }

    pub fn task_start(task: &str) -> Self {
        Self::new(RecordKind::TaskStart, task)
    }

    pub fn task_end(task: &str) -> Self {
        Self::new(RecordKind::TaskEnd, task)
    }

    pub fn reflection(text: &str) -> Self {
        Self::new(RecordKind::Reflection, text)
    }

    /// 步骤记录：`{step, result, timestamp}`
    pub fn step(action: &str, result: Value) -> Self {
        let timestamp = now_secs();
        Self {
            kind: RecordKind::Step,
            content: serde_json::json!({
                "step": action,
                "result": result,
                "timestamp": timestamp,
            }),
            timestamp,
        }
    }

    /// 内容序列化文本，用于子串检索
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
