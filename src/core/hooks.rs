//! 生命周期钩子
//!
//! 运行前 / 运行后各一条有序钩子链，按注册顺序执行。
//! 单个钩子失败、panic 或超时只记录日志，不影响后续钩子与本次运行。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::{Map, Value};

use crate::core::error::panic_message;
use crate::core::{AgentError, StructuredResult};

type HookOutcome =
    Result<Result<anyhow::Result<()>, Box<dyn Any + Send>>, tokio::time::error::Elapsed>;

/// 钩子可见的运行上下文
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    pub agent_name: &'a str,
    pub task: &'a str,
    pub user_id: Option<&'a str>,
    pub extra: &'a Map<String, Value>,
}

/// 运行前钩子
#[async_trait]
pub trait PreRunHook: Send + Sync {
    fn name(&self) -> &str;

    async fn before_run(&self, ctx: &HookContext<'_>) -> anyhow::Result<()>;
}

/// 运行后钩子：失败时同样会被调用
#[async_trait]
pub trait PostRunHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after_run(&self, ctx: &HookContext<'_>, result: &StructuredResult) -> anyhow::Result<()>;
}

/// 单个钩子的执行超时
const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// 钩子链
#[derive(Clone)]
pub struct HookChain {
    pre: Vec<Arc<dyn PreRunHook>>,
    post: Vec<Arc<dyn PostRunHook>>,
    timeout: Duration,
}

impl Default for HookChain {
    fn default() -> Self {
        Self {
            pre: Vec::new(),
            post: Vec::new(),
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn push_pre(&mut self, hook: Arc<dyn PreRunHook>) {
        self.pre.push(hook);
    }

    pub fn push_post(&mut self, hook: Arc<dyn PostRunHook>) {
        self.post.push(hook);
    }

    /// 依次执行运行前钩子，返回被吞掉的失败
    pub async fn run_pre(&self, ctx: &HookContext<'_>) -> Vec<AgentError> {
        let mut failures = Vec::new();
        for hook in &self.pre {
            let call = AssertUnwindSafe(hook.before_run(ctx)).catch_unwind();
            let outcome = tokio::time::timeout(self.timeout, call).await;
            if let Some(err) = self.settle(hook.name(), outcome) {
                failures.push(err);
            }
        }
        failures
    }

    /// 依次执行运行后钩子，返回被吞掉的失败
    pub async fn run_post(&self, ctx: &HookContext<'_>, result: &StructuredResult) -> Vec<AgentError> {
        let mut failures = Vec::new();
        for hook in &self.post {
            let call = AssertUnwindSafe(hook.after_run(ctx, result)).catch_unwind();
            let outcome = tokio::time::timeout(self.timeout, call).await;
            if let Some(err) = self.settle(hook.name(), outcome) {
                failures.push(err);
            }
        }
        failures
    }

    fn settle(&self, name: &str, outcome: HookOutcome) -> Option<AgentError> {
        let message = match outcome {
            Ok(Ok(Ok(()))) => {
                tracing::debug!("Hook '{}' completed", name);
                return None;
            }
            Ok(Ok(Err(e))) => format!("{:#}", e),
            Ok(Err(payload)) => format!("panicked: {}", panic_message(payload.as_ref())),
            Err(_) => format!("timed out after {:?}", self.timeout),
        };
        tracing::error!("Hook {} failed: {}", name, message);
        Some(AgentError::HookFailed {
            hook: name.to_string(),
            message,
        })
    }
}
