//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient, ScriptedReply};
pub use openai::{create_llm_from_config, OpenAiClient, TokenUsage};
pub use traits::{extract_json, LlmClient};
