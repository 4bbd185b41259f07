//! 核心编排层：错误、运行阶段、钩子、指标、结构化结果与执行控制器

pub mod controller;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod result;
pub mod state;

pub use controller::{Agent, AgentBuilder, Strategy, TaskContext};
pub use error::AgentError;
pub use hooks::{HookChain, HookContext, PostRunHook, PreRunHook};
pub use metrics::AgentMetrics;
pub use result::{RunMetadata, StructuredResult};
pub use state::RunPhase;
