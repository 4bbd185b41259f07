//! 对话记录：ReAct 循环的消息历史
//!
//! 每轮模型输出与纠正/观察消息依次追加，超出上限时丢弃最旧消息（固定的开头消息除外），供下一轮拼 prompt 使用。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息：`{role, content}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 消息历史，最多保留 max_messages 条
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_messages: usize,
    pinned: usize,
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(1),
            pinned: 0,
        }
    }

    /// 前 count 条消息永不被裁剪（如 ReAct 的任务描述）
    pub fn with_pinned(mut self, count: usize) -> Self {
        self.pinned = count;
        self.max_messages = self.max_messages.max(count + 1);
        self
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn prune(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(self.pinned..self.pinned + excess);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_latest() {
        let mut conv = ConversationMemory::new(2);
        conv.push(Message::user("a"));
        conv.push(Message::assistant("b"));
        conv.push(Message::user("c"));
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].content, "b");
        assert_eq!(conv.messages()[1].content, "c");
    }

    #[test]
    fn test_pinned_head_survives_pruning() {
        let mut conv = ConversationMemory::new(3).with_pinned(1);
        for text in ["task", "a", "b", "c", "d"] {
            conv.push(Message::user(text));
        }
        let contents: Vec<&str> = conv.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["task", "c", "d"]);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }
}
