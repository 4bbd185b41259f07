//! ReAct 主循环
//!
//! 拼 system prompt -> 调用模型 -> 解析 Thought / Action / Action Input / Final Answer ->
//! 工具调用经 Dispatcher 执行并把 Tool Result / Tool Error 写回对话 -> 下一轮。
//! 每一次纠正（格式错误、工具错误、输出 schema 不符）都消耗一次重试额度，
//! 第 max_retries 次纠正或达到最大轮数时返回 ReactExhausted。

use std::sync::Arc;

use serde_json::Value;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{ConversationMemory, MemoryRecord, MemoryStore, Message};
use crate::react::parser::{parse_react_output, ReactParse};
use crate::react::Step;
use crate::tools::schema::validate_text_against_schema;
use crate::tools::{render_catalog, ToolDescriptor, ToolDispatcher, ToolOutcome};

/// 对话历史保留条数上限；首条任务消息固定保留
const TRANSCRIPT_LIMIT: usize = 64;
/// 模型未给出 Thought 时写入步骤的理由
const DEFAULT_REASON: &str = "ReAct action";

const BASE_RULES: &[&str] = &[
    "You are a reasoning agent that uses Chain of Thought and the ReAct paradigm.",
    "Think step-by-step and decide whether you need to use tools.",
    "Format your response according to these rules:",
    "1. Always start your thinking with 'Thought:'",
    "2. If a tool is needed, write 'Action: TOOL_NAME' followed by 'Action Input: <JSON object of arguments>'",
    "3. For final answers, use 'Final Answer:' followed by the response",
];

/// 单次 ReAct 运行所需的外部协作者
pub struct ReactSession<'a> {
    pub dispatcher: &'a ToolDispatcher,
    pub memory: &'a dyn MemoryStore,
    pub user_id: Option<&'a str>,
}

/// 运行轨迹：即使中途超时，已写入的部分也会保留
#[derive(Debug)]
pub struct ReactTrace {
    pub thoughts: Vec<String>,
    pub observations: Vec<ToolOutcome>,
    pub transcript: ConversationMemory,
    pub iterations: usize,
    pub retries_used: u32,
}

impl Default for ReactTrace {
    fn default() -> Self {
        Self {
            thoughts: Vec::new(),
            observations: Vec::new(),
            transcript: ConversationMemory::new(TRANSCRIPT_LIMIT).with_pinned(1),
            iterations: 0,
            retries_used: 0,
        }
    }
}

/// ReAct 执行器
pub struct ReactRunner {
    llm: Arc<dyn LlmClient>,
    output_schema: Option<Value>,
    max_retries: u32,
    max_steps: usize,
}

impl ReactRunner {
    pub fn new(llm: Arc<dyn LlmClient>, max_retries: u32, max_steps: usize) -> Self {
        Self {
            llm,
            output_schema: None,
            max_retries,
            max_steps: max_steps.max(1),
        }
    }

    pub fn with_output_schema(mut self, schema: Option<Value>) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn system_prompt(&self, catalog: &[ToolDescriptor]) -> String {
        let mut prompt = BASE_RULES.join("\n");
        if !catalog.is_empty() {
            prompt.push_str("\n\nAvailable Tools:\n");
            prompt.push_str(&render_catalog(catalog));
        }
        if let Some(schema) = &self.output_schema {
            let schema_str =
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
            prompt.push_str("\n\nOutput must conform to this JSON schema:\n");
            prompt.push_str(&schema_str);
        }
        prompt
    }

    /// 运行到得到最终答案为止；模型调用失败直接返回 LlmError
    pub async fn run(
        &self,
        task: &str,
        session: &ReactSession<'_>,
        trace: &mut ReactTrace,
    ) -> Result<String, AgentError> {
        let catalog = session.dispatcher.catalog();
        let system = Message::system(self.system_prompt(&catalog));
        trace.transcript.push(Message::user(task));

        while trace.iterations < self.max_steps {
            trace.iterations += 1;

            let mut messages = Vec::with_capacity(trace.transcript.len() + 1);
            messages.push(system.clone());
            messages.extend_from_slice(trace.transcript.messages());

            let response = self
                .llm
                .complete(&messages)
                .await
                .map_err(AgentError::LlmError)?;
            let parsed = parse_react_output(&response);
            tracing::debug!(iteration = trace.iterations, "ReAct parsed: {:?}", parsed);
            if let Some(thought) = &parsed.thought {
                trace.thoughts.push(thought.clone());
            }
            trace.transcript.push(Message::assistant(response));

            let correction = if let Some(answer) = &parsed.final_answer {
                match self.check_answer(answer) {
                    Ok(()) => return Ok(answer.clone()),
                    Err(msg) => msg,
                }
            } else if let Some(action) = &parsed.action {
                match self.act(action, &parsed, session, trace).await {
                    Ok(observation) => {
                        trace
                            .transcript
                            .push(Message::user(format!("Tool Result: {}", observation)));
                        continue;
                    }
                    Err(e) => format!("Tool Error: {}", e),
                }
            } else {
                "Please provide a valid response format: start with 'Thought:', then either \
                 'Action:' with 'Action Input:' or 'Final Answer:'"
                    .to_string()
            };

            trace.transcript.push(Message::user(correction));
            trace.retries_used += 1;
            if trace.retries_used >= self.max_retries {
                tracing::warn!(
                    "ReAct gave up after {} corrective iterations",
                    trace.retries_used
                );
                return Err(AgentError::ReactExhausted);
            }
        }

        tracing::warn!("ReAct reached the step limit ({})", self.max_steps);
        Err(AgentError::ReactExhausted)
    }

    fn check_answer(&self, answer: &str) -> Result<(), String> {
        let Some(schema) = &self.output_schema else {
            return Ok(());
        };
        validate_text_against_schema(schema, answer).map(|_| ()).map_err(|e| {
            tracing::warn!("Final answer rejected: {}", e);
            format!("Invalid output structure ({}). Required schema: {}", e, schema)
        })
    }

    /// 经 Dispatcher 调用工具，结果同时写入记忆
    async fn act(
        &self,
        action: &str,
        parsed: &ReactParse,
        session: &ReactSession<'_>,
        trace: &mut ReactTrace,
    ) -> Result<String, String> {
        let parameters = parsed.parameters().map_err(|e| e.to_string())?;
        let reason = parsed.thought.as_deref().unwrap_or(DEFAULT_REASON);
        let step = Step::new(action, parameters, reason).map_err(|e| e.to_string())?;

        let outcome = session
            .dispatcher
            .execute(&step, session.memory, session.user_id)
            .await;
        session
            .memory
            .add(MemoryRecord::step(step.action(), outcome.to_value()));
        let rendered = outcome.render();
        let failed = outcome.is_error();
        trace.observations.push(outcome);

        if failed {
            Err(rendered)
        } else {
            Ok(rendered)
        }
    }
}
