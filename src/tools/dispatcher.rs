//! 工具派发器
//!
//! 解析步骤 action -> 工具（ToolNotFound / ToolNotAllowed 不重试），合并参数与记忆检索得到 ToolInput，
//! 在单次超时内调用工具（工具 panic 视为执行失败），strict_validation 时按工具输出 schema 校验；
//! 可重试的错误按退避策略重试 max_retries 次，最终返回结构化错误而非抛出。
//! 每次尝试输出结构化审计日志（JSON）。

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;
use tokio::time::timeout;

use crate::config::AgentConfig;
use crate::core::error::panic_message;
use crate::core::AgentError;
use crate::memory::MemoryStore;
use crate::react::Step;
use crate::tools::schema::{check_schema, validate_against_schema};
use crate::tools::{
    BackoffPolicy, LinearBackoff, Sleeper, TokioSleeper, Tool, ToolDescriptor, ToolFailure,
    ToolInput, ToolOutcome, ToolRegistry,
};

/// 检索上下文时使用的参数名
pub const QUERY_PARAMETER: &str = "query";

/// 派发器：持有注册表、允许列表与重试/校验策略
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    allowed_tools: HashSet<String>,
    max_retries: u32,
    strict_validation: bool,
    tool_timeout: Duration,
    context_top_k: usize,
    backoff: Arc<dyn BackoffPolicy>,
    sleeper: Arc<dyn Sleeper>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, config: &AgentConfig) -> Self {
        Self {
            registry,
            allowed_tools: config.allowed_tools.iter().cloned().collect(),
            max_retries: u32::from(config.max_retries),
            strict_validation: config.strict_validation,
            tool_timeout: config.tool_timeout(),
            context_top_k: config.context_top_k,
            backoff: Arc::new(LinearBackoff::new(config.backoff_unit())),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// 当前允许使用的工具目录，拼入规划与 ReAct prompt
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.registry
            .list()
            .into_iter()
            .filter(|t| self.allowed_tools.is_empty() || self.allowed_tools.contains(&t.name))
            .collect()
    }

    /// 按名解析工具并检查允许列表（空列表表示全部允许）
    pub fn resolve(&self, action: &str) -> Result<Arc<dyn Tool>, AgentError> {
        let tool = self
            .registry
            .get(action)
            .ok_or_else(|| AgentError::ToolNotFound(action.to_string()))?;
        if !self.allowed_tools.is_empty() && !self.allowed_tools.contains(action) {
            return Err(AgentError::ToolNotAllowed(action.to_string()));
        }
        Ok(tool)
    }

    /// 合并步骤参数与记忆上下文（以 query 参数检索，缺省为空串即最近记录）
    pub fn build_input(
        &self,
        step: &Step,
        memory: &dyn MemoryStore,
        user_id: Option<&str>,
    ) -> ToolInput {
        let query = step
            .parameters()
            .get(QUERY_PARAMETER)
            .and_then(Value::as_str)
            .unwrap_or("");
        let context = memory.retrieve(Some(query), self.context_top_k);
        ToolInput::new(step.parameters().clone())
            .with_context(context)
            .with_user_id(user_id.map(String::from))
    }

    /// 执行一个步骤；总尝试次数为 max_retries + 1
    pub async fn execute(
        &self,
        step: &Step,
        memory: &dyn MemoryStore,
        user_id: Option<&str>,
    ) -> ToolOutcome {
        let tool = match self.resolve(step.action()) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(tool = step.action(), "{}", e);
                return ToolOutcome::Failed(ToolFailure::from_agent_error(&e));
            }
        };
        let input = self.build_input(step, memory, user_id);

        let mut last_error = AgentError::ToolExecutionFailed("no attempt made".to_string());
        for attempt in 0..=self.max_retries {
            match self.attempt(tool.as_ref(), input.clone(), attempt).await {
                Ok(value) => return ToolOutcome::Success(value),
                Err(e) if !e.is_retryable() => {
                    tracing::error!(tool = step.action(), "{}", e);
                    return ToolOutcome::Failed(ToolFailure::from_agent_error(&e));
                }
                Err(e) => {
                    tracing::warn!(tool = step.action(), attempt, "Attempt {} failed: {}", attempt, e);
                    last_error = e;
                    if attempt < self.max_retries {
                        self.sleeper.sleep(self.backoff.delay(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(
            tool = step.action(),
            "Giving up after {} retries: {}",
            self.max_retries,
            last_error
        );
        ToolOutcome::Failed(ToolFailure::new(
            format!("Failed after {} retries", self.max_retries),
            last_error.to_string(),
        ))
    }

    /// 单次尝试：超时内调用工具，必要时校验输出
    async fn attempt(
        &self,
        tool: &dyn Tool,
        input: ToolInput,
        attempt: u32,
    ) -> Result<Value, AgentError> {
        let start = Instant::now();
        let args_preview = args_preview(&input);
        let call = AssertUnwindSafe(tool.execute(input)).catch_unwind();
        let result = timeout(self.tool_timeout, call).await;

        let result = match result {
            Ok(Ok(Ok(value))) => self.validate_output(tool, value),
            Ok(Ok(Err(e))) => Err(AgentError::ToolExecutionFailed(e)),
            Ok(Err(payload)) => Err(AgentError::ToolExecutionFailed(format!(
                "tool panicked: {}",
                panic_message(payload.as_ref())
            ))),
            Err(_) => Err(AgentError::ToolTimeout(tool.name().to_string())),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AgentError::OutputValidation(_)) => "invalid_output",
            Err(AgentError::ToolTimeout(_)) => "timeout",
            Err(AgentError::ConfigError(_)) => "invalid_schema",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool.name(),
            "attempt": attempt,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result
    }

    fn validate_output(&self, tool: &dyn Tool, value: Value) -> Result<Value, AgentError> {
        if !self.strict_validation {
            return Ok(value);
        }
        match tool.output_schema() {
            Some(schema) => {
                check_schema(schema).map_err(|e| {
                    AgentError::ConfigError(format!("tool {} declares an {}", tool.name(), e))
                })?;
                validate_against_schema(schema, &value).map_err(AgentError::OutputValidation)?;
                Ok(value)
            }
            None => Ok(value),
        }
    }
}

fn args_preview(input: &ToolInput) -> String {
    let s = Value::Object(input.parameters.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::memory::{MemoryRecord, RecordKind, ShortTermMemory};
    use crate::tools::{AsyncFnTool, FnTool, RecordingSleeper};

    fn step(action: &str, params: Value) -> Step {
        Step::new(action, params.as_object().cloned().unwrap_or_default(), "because").unwrap()
    }

    fn dispatcher(registry: ToolRegistry, config: &AgentConfig, sleeper: Arc<RecordingSleeper>) -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(registry), config)
            .with_backoff(Arc::new(LinearBackoff::new(Duration::from_secs(1))))
            .with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_always_failing_tool_attempted_max_retries_plus_one() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::new("flaky", "always fails", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_string())
        }));
        let config = AgentConfig::default().with_max_retries(3);
        let sleeper = Arc::new(RecordingSleeper::new());
        let d = dispatcher(registry, &config, sleeper.clone());

        let outcome = d.execute(&step("flaky", json!({})), &ShortTermMemory::unbounded(), None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_secs(0),
                Duration::from_secs(1),
                Duration::from_secs(2)
            ]
        );
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.error, "Failed after 3 retries");
        assert!(failure.exception.contains("boom"));
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::new("sometimes", "", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("transient".to_string())
            } else {
                Ok(json!("ok"))
            }
        }));
        let sleeper = Arc::new(RecordingSleeper::new());
        let d = dispatcher(registry, &AgentConfig::default(), sleeper.clone());

        let outcome = d.execute(&step("sometimes", json!({})), &ShortTermMemory::unbounded(), None).await;

        assert_eq!(outcome, ToolOutcome::Success(json!("ok")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.delays(), vec![Duration::ZERO]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_retried() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let d = dispatcher(ToolRegistry::new(), &AgentConfig::default(), sleeper.clone());
        let outcome = d.execute(&step("ghost", json!({})), &ShortTermMemory::unbounded(), None).await;
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.error, "Tool not found: ghost");
        assert_eq!(failure.exception, "ToolNotFound");
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_tool_outside_allow_list_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::new("shell", "", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }));
        let config = AgentConfig::default().with_allowed_tools(["echo"]);
        let d = dispatcher(registry, &config, Arc::new(RecordingSleeper::new()));
        let outcome = d.execute(&step("shell", json!({})), &ShortTermMemory::unbounded(), None).await;
        assert_eq!(outcome.failure().unwrap().exception, "ToolNotAllowed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_output_schema_violation_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(
            FnTool::new("weather", "", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"summary": "sunny"}))
            })
            .with_output_schema(json!({"type": "object", "required": ["temp"]})),
        );
        let config = AgentConfig::default().with_max_retries(1);
        let d = dispatcher(registry, &config, Arc::new(RecordingSleeper::new()));
        let outcome = d.execute(&step("weather", json!({})), &ShortTermMemory::unbounded(), None).await;
        assert!(outcome.is_error());
        assert!(outcome.failure().unwrap().exception.contains("Output validation failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_output_schema_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(
            FnTool::new("weather", "", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"summary": "sunny"}))
            })
            .with_output_schema(json!({"type": 12})),
        );
        let config = AgentConfig::default().with_max_retries(3);
        let sleeper = Arc::new(RecordingSleeper::new());
        let d = dispatcher(registry, &config, sleeper.clone());
        let outcome = d.execute(&step("weather", json!({})), &ShortTermMemory::unbounded(), None).await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.exception, "ConfigError");
        assert!(failure.error.contains("invalid schema"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_tool_is_retried_then_recorded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::new("buggy", "", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("tool bug");
        }));
        let config = AgentConfig::default().with_max_retries(1);
        let sleeper = Arc::new(RecordingSleeper::new());
        let d = dispatcher(registry, &config, sleeper.clone());

        let outcome = d.execute(&step("buggy", json!({})), &ShortTermMemory::unbounded(), None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.delays(), vec![Duration::ZERO]);
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.error, "Failed after 1 retries");
        assert_eq!(failure.exception, "Tool execution failed: tool panicked: tool bug");
    }

    #[tokio::test]
    async fn test_schema_ignored_without_strict_validation() {
        let mut registry = ToolRegistry::new();
        registry.register(
            FnTool::new("weather", "", |_| Ok(json!({"summary": "sunny"})))
                .with_output_schema(json!({"type": "object", "required": ["temp"]})),
        );
        let config = AgentConfig::default().with_strict_validation(false);
        let d = dispatcher(registry, &config, Arc::new(RecordingSleeper::new()));
        let outcome = d.execute(&step("weather", json!({})), &ShortTermMemory::unbounded(), None).await;
        assert!(!outcome.is_error());
    }

    #[tokio::test]
    async fn test_input_carries_query_context_and_user() {
        let mut registry = ToolRegistry::new();
        registry.register(AsyncFnTool::new("inspect", "", |input: ToolInput| async move {
            Ok(json!({
                "context": input.context.len(),
                "user": input.user_id,
                "city": input.param_str("city"),
            }))
        }));
        let memory = ShortTermMemory::unbounded();
        memory.add(MemoryRecord::new(RecordKind::Step, "tokyo is rainy"));
        memory.add(MemoryRecord::new(RecordKind::Step, "paris is sunny"));
        let d = dispatcher(registry, &AgentConfig::default(), Arc::new(RecordingSleeper::new()));

        let outcome = d
            .execute(
                &step("inspect", json!({"query": "Tokyo", "city": "Tokyo"})),
                &memory,
                Some("u-1"),
            )
            .await;
        assert_eq!(
            outcome,
            ToolOutcome::Success(json!({"context": 1, "user": "u-1", "city": "Tokyo"}))
        );
    }
}
