//! 执行控制器：Agent
//!
//! 一次 run：task_start 记录 -> 运行前钩子 -> 规划（结构化计划或 ReAct）-> 逐步执行 ->
//! 可选反思 -> 运行后钩子 -> task_end 记录。
//! 规划、执行与反思整体受 config.timeout 约束，并可被 CancellationToken 取消；
//! 超时或取消时已写入的记忆与部分结果都会保留。run 不返回错误，所有失败都收敛进 StructuredResult。

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::core::{
    AgentError, AgentMetrics, HookChain, HookContext, PostRunHook, PreRunHook, RunMetadata,
    RunPhase, StructuredResult,
};
use crate::llm::LlmClient;
use crate::memory::{resolve_documents, MemoryRecord, MemoryStore, SemanticIndex, ShortTermMemory};
use crate::react::{PlanGenerator, ReactRunner, ReactSession, ReactTrace, Reflector, Step};
use crate::tools::{BackoffPolicy, Sleeper, ToolDispatcher, ToolOutcome, ToolRegistry};

/// 规划前从语义索引召回的条数
const RECALL_TOP_K: usize = 3;

/// 规划策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// 一次模型调用生成完整计划，再逐步派发
    #[default]
    Structured,
    /// 推理-行动循环，每次工具调用后重新询问模型
    React,
}

/// 调用方附带的上下文
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    pub user_id: Option<String>,
    pub extra: Map<String, Value>,
}

impl TaskContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            extra: Map::new(),
        }
    }
}

/// 单次 run 的中间状态；执行被超时丢弃时仍可从这里取回部分结果
#[derive(Default)]
struct RunTrace {
    plan: Vec<Step>,
    results: Vec<ToolOutcome>,
    halted_at: Option<usize>,
    react: ReactTrace,
    final_answer: Option<String>,
    reflection: Option<String>,
    errors: Vec<String>,
    failed: bool,
}

impl RunTrace {
    fn outcomes(&self, strategy: Strategy) -> &[ToolOutcome] {
        match strategy {
            Strategy::Structured => &self.results,
            Strategy::React => &self.react.observations,
        }
    }
}

pub struct Agent {
    config: AgentConfig,
    strategy: Strategy,
    registry: Arc<ToolRegistry>,
    dispatcher: ToolDispatcher,
    planner: PlanGenerator,
    react: ReactRunner,
    reflector: Reflector,
    memory: Arc<dyn MemoryStore>,
    semantic_index: Option<Arc<dyn SemanticIndex>>,
    hooks: HookChain,
    phase: RunPhase,
    metrics: AgentMetrics,
}

impl Agent {
    pub fn builder(llm: Arc<dyn LlmClient>, registry: impl Into<Arc<ToolRegistry>>) -> AgentBuilder {
        AgentBuilder::new(llm, registry.into())
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    pub async fn run(&mut self, task: &str) -> StructuredResult {
        self.run_with_context(task, TaskContext::default()).await
    }

    pub async fn run_with_context(&mut self, task: &str, ctx: TaskContext) -> StructuredResult {
        self.run_with_cancel(task, ctx, CancellationToken::new()).await
    }

    /// 完整生命周期；取消与超时一样：放弃进行中的步骤，保留已有记录
    pub async fn run_with_cancel(
        &mut self,
        task: &str,
        ctx: TaskContext,
        cancel: CancellationToken,
    ) -> StructuredResult {
        let started = Instant::now();
        let agent_name = self.config.name.clone();
        let hook_ctx = HookContext {
            agent_name: &agent_name,
            task,
            user_id: ctx.user_id.as_deref(),
            extra: &ctx.extra,
        };

        self.phase = RunPhase::Init;
        tracing::info!(agent = %agent_name, strategy = ?self.strategy, "Task started");
        self.memory.add(MemoryRecord::task_start(task));

        self.phase = RunPhase::PreHooks;
        self.hooks.run_pre(&hook_ctx).await;

        let limit = self.config.timeout();
        let limit_secs = self.config.timeout_secs;
        let strategy = self.strategy;
        let mut trace = RunTrace::default();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            bounded = tokio::time::timeout(limit, self.execute(task, &ctx, started, &mut trace)) => {
                bounded.unwrap_or(Err(AgentError::Timeout(limit_secs)))
            }
        };

        if let Err(e) = &outcome {
            tracing::error!(agent = %agent_name, "Run failed: {}", e);
            trace.errors.insert(0, e.to_string());
        }
        let success = outcome.is_ok() && !trace.failed;
        let result = self.build_result(success, strategy, trace, started);

        self.phase = RunPhase::PostHooks;
        self.hooks.run_post(&hook_ctx, &result).await;
        self.memory.add(MemoryRecord::task_end(task));

        self.phase = if success { RunPhase::Done } else { RunPhase::Failed };
        tracing::info!(
            agent = %agent_name,
            success,
            steps = result.metadata.steps_executed,
            elapsed_secs = result.metadata.execution_time,
            "Task finished"
        );
        result
    }

    /// 受时限约束的部分：规划、执行、反思与指标更新
    async fn execute(
        &mut self,
        task: &str,
        ctx: &TaskContext,
        started: Instant,
        trace: &mut RunTrace,
    ) -> Result<(), AgentError> {
        let prompt = self.recall(task);
        match self.strategy {
            Strategy::Structured => self.execute_plan(&prompt, ctx, trace).await?,
            Strategy::React => self.execute_react(&prompt, ctx, trace).await?,
        }

        if self.config.reflection_enabled {
            self.phase = RunPhase::Reflecting;
            let reflection = self
                .reflector
                .reflect(task, trace.outcomes(self.strategy))
                .await;
            match reflection {
                Ok(text) => {
                    self.memory.add(MemoryRecord::reflection(&text));
                    if let Some(index) = &self.semantic_index {
                        index.add(&text);
                    }
                    trace.reflection = Some(text);
                }
                Err(e) => {
                    tracing::warn!("Reflection failed: {}", e);
                    trace.errors.push(format!("Reflection failed: {}", e));
                }
            }
        }

        self.metrics.record_task(started.elapsed().as_secs_f64());
        Ok(())
    }

    /// 把语义索引中相关的历史反思附加到任务描述后
    fn recall(&self, task: &str) -> String {
        let Some(index) = &self.semantic_index else {
            return task.to_string();
        };
        let notes = resolve_documents(index.as_ref(), &index.retrieve(task, RECALL_TOP_K));
        if notes.is_empty() {
            return task.to_string();
        }
        tracing::debug!("Recalled {} notes from previous runs", notes.len());
        let notes: Vec<String> = notes.iter().map(|n| format!("- {}", n)).collect();
        format!(
            "{}\n\nRelevant notes from previous runs:\n{}",
            task,
            notes.join("\n")
        )
    }

    async fn execute_plan(
        &mut self,
        task: &str,
        ctx: &TaskContext,
        trace: &mut RunTrace,
    ) -> Result<(), AgentError> {
        self.phase = RunPhase::Planning;
        let catalog = self.dispatcher.catalog();
        trace.plan = self.planner.generate(task, &catalog).await?;

        for (i, step) in trace.plan.iter().enumerate() {
            self.phase = RunPhase::Executing { step: i };
            tracing::debug!(step = i, action = step.action(), "Executing step");

            let outcome = self
                .dispatcher
                .execute(step, self.memory.as_ref(), ctx.user_id.as_deref())
                .await;
            self.memory
                .add(MemoryRecord::step(step.action(), outcome.to_value()));
            self.metrics.record_step();

            let failed = outcome.is_error();
            trace.results.push(outcome);
            if failed {
                tracing::warn!(step = i, action = step.action(), "Step failed, halting execution");
                trace.halted_at = Some(i);
                break;
            }
        }
        Ok(())
    }

    async fn execute_react(
        &mut self,
        task: &str,
        ctx: &TaskContext,
        trace: &mut RunTrace,
    ) -> Result<(), AgentError> {
        self.phase = RunPhase::Executing { step: 0 };
        let session = ReactSession {
            dispatcher: &self.dispatcher,
            memory: self.memory.as_ref(),
            user_id: ctx.user_id.as_deref(),
        };
        let outcome = self.react.run(task, &session, &mut trace.react).await;
        for _ in &trace.react.observations {
            self.metrics.record_step();
        }

        match outcome {
            Ok(answer) => trace.final_answer = Some(answer),
            Err(AgentError::ReactExhausted) => {
                trace.failed = true;
                trace.errors.push(AgentError::ReactExhausted.to_string());
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn build_result(
        &self,
        success: bool,
        strategy: Strategy,
        trace: RunTrace,
        started: Instant,
    ) -> StructuredResult {
        let outcomes = trace.outcomes(strategy);
        let steps_executed = outcomes.len();

        let mut data = Map::new();
        data.insert(
            "results".to_string(),
            Value::Array(outcomes.iter().map(ToolOutcome::to_value).collect()),
        );
        match strategy {
            Strategy::Structured => {
                if !trace.plan.is_empty() {
                    data.insert(
                        "plan".to_string(),
                        serde_json::to_value(&trace.plan).unwrap_or(Value::Null),
                    );
                }
                if let Some(i) = trace.halted_at {
                    data.insert("halted_at".to_string(), Value::from(i));
                }
            }
            Strategy::React => {
                if let Some(answer) = trace.final_answer {
                    data.insert("final_answer".to_string(), Value::String(answer));
                }
                data.insert("thoughts".to_string(), Value::from(trace.react.thoughts));
            }
        }
        if let Some(reflection) = trace.reflection {
            data.insert("reflection".to_string(), Value::String(reflection));
        }

        StructuredResult {
            success,
            data,
            errors: trace.errors,
            metadata: RunMetadata {
                execution_time: started.elapsed().as_secs_f64(),
                steps_executed,
                agent_config: self.config.clone(),
            },
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(tools={}, memory={})",
            self.config.name,
            self.registry.len(),
            self.memory.len()
        )
    }
}

/// Agent 构建器
pub struct AgentBuilder {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
    strategy: Strategy,
    memory: Option<Arc<dyn MemoryStore>>,
    semantic_index: Option<Arc<dyn SemanticIndex>>,
    hooks: HookChain,
    backoff: Option<Arc<dyn BackoffPolicy>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    output_schema: Option<Value>,
    planner_prompt: Option<String>,
    reflection_template: Option<String>,
}

impl AgentBuilder {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            registry,
            config: AgentConfig::default(),
            strategy: Strategy::default(),
            memory: None,
            semantic_index: None,
            hooks: HookChain::new(),
            backoff: None,
            sleeper: None,
            output_schema: None,
            planner_prompt: None,
            reflection_template: None,
        }
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// 默认使用容量为 config.memory_capacity 的短期记忆
    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn semantic_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.semantic_index = Some(index);
        self
    }

    pub fn pre_hook(mut self, hook: Arc<dyn PreRunHook>) -> Self {
        self.hooks.push_pre(hook);
        self
    }

    pub fn post_hook(mut self, hook: Arc<dyn PostRunHook>) -> Self {
        self.hooks.push_post(hook);
        self
    }

    pub fn hook_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.hooks = self.hooks.with_timeout(timeout);
        self
    }

    pub fn backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// ReAct 最终答案需满足的 JSON Schema
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn planner_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.planner_prompt = Some(prompt.into());
        self
    }

    pub fn reflection_template(mut self, template: impl Into<String>) -> Self {
        self.reflection_template = Some(template.into());
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        self.config.validate()?;

        let mut dispatcher = ToolDispatcher::new(self.registry.clone(), &self.config);
        if let Some(backoff) = self.backoff {
            dispatcher = dispatcher.with_backoff(backoff);
        }
        if let Some(sleeper) = self.sleeper {
            dispatcher = dispatcher.with_sleeper(sleeper);
        }

        let mut planner = PlanGenerator::new(self.llm.clone());
        if let Some(prompt) = self.planner_prompt {
            planner = planner.with_system_prompt(prompt);
        }
        let mut reflector = Reflector::new(self.llm.clone());
        if let Some(template) = self.reflection_template {
            reflector = reflector.with_template(template);
        }
        let react = ReactRunner::new(
            self.llm,
            u32::from(self.config.max_retries),
            self.config.max_react_steps,
        )
        .with_output_schema(self.output_schema);

        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(ShortTermMemory::bounded(self.config.memory_capacity)));

        tracing::debug!(
            agent = %self.config.name,
            tools = self.registry.len(),
            "Agent built"
        );

        Ok(Agent {
            config: self.config,
            strategy: self.strategy,
            registry: self.registry,
            dispatcher,
            planner,
            react,
            reflector,
            memory,
            semantic_index: self.semantic_index,
            hooks: self.hooks,
            phase: RunPhase::Init,
            metrics: AgentMetrics::default(),
        })
    }
}
