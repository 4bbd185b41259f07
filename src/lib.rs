//! Stepwise - 单 Agent 任务执行引擎
//!
//! 给定自然语言任务，由模型生成计划（或走 ReAct 循环），逐步调用注册的工具，
//! 累积记忆轨迹，可选反思，最终返回从不抛错的结构化结果。
//!
//! 模块划分：
//! - **config**: Agent 配置与加载（TOML + 环境变量）
//! - **core**: 错误、运行阶段、钩子、指标、结构化结果与执行控制器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）
//! - **memory**: 对话历史、短期记录日志、长期语义索引
//! - **observability**: tracing 初始化
//! - **react**: 步骤校验、计划生成、ReAct 解析与循环、反思
//! - **tools**: Tool 能力、注册表、重试退避与派发器

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::config::{load_agent_config, load_config, AgentConfig, AppConfig, LlmSection};
pub use crate::core::{
    Agent, AgentBuilder, AgentError, AgentMetrics, PostRunHook, PreRunHook, RunPhase, Strategy,
    StructuredResult, TaskContext,
};
pub use crate::llm::{create_llm_from_config, LlmClient, MockLlmClient, ScriptedLlmClient};
pub use crate::memory::{KeywordIndex, MemoryRecord, MemoryStore, SemanticIndex, ShortTermMemory};
pub use crate::tools::{AsyncFnTool, FnTool, Tool, ToolInput, ToolOutcome, ToolRegistry};
