//! Agent 错误类型
//!
//! 覆盖规划、步骤形状、工具解析/执行/校验、钩子、超时与取消；
//! 除控制器自身缺陷外，所有预期错误都会被收敛进步骤错误载荷或 StructuredResult.errors。

use std::any::Any;

use thiserror::Error;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// 计划为空或无法解析，立即结束本次运行
    #[error("Planning failed: {0}")]
    PlanningFailure(String),

    /// 步骤缺少 action / parameters / reason，会在派发前被丢弃
    #[error("Invalid step: {0}")]
    StepShapeInvalid(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool not allowed: {0}")]
    ToolNotAllowed(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Output validation failed: {0}")]
    OutputValidation(String),

    /// 钩子失败：仅记录日志，不会中止运行
    #[error("Hook {hook} failed: {message}")]
    HookFailed { hook: String, message: String },

    #[error("Run timed out after {0:.3}s")]
    Timeout(f64),

    #[error("Cancelled")]
    Cancelled,

    /// ReAct 纠正次数用尽仍未得到合法最终答案
    #[error("Unable to produce a valid response after maximum retries")]
    ReactExhausted,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 错误类别名，写入 ToolFailure.exception 等结构化载荷
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::PlanningFailure(_) => "PlanningFailure",
            AgentError::StepShapeInvalid(_) => "StepShapeInvalid",
            AgentError::ToolNotFound(_) => "ToolNotFound",
            AgentError::ToolNotAllowed(_) => "ToolNotAllowed",
            AgentError::ToolExecutionFailed(_) => "ToolExecutionError",
            AgentError::ToolTimeout(_) => "ToolTimeout",
            AgentError::OutputValidation(_) => "OutputValidationError",
            AgentError::HookFailed { .. } => "HookError",
            AgentError::Timeout(_) => "TimeoutError",
            AgentError::Cancelled => "Cancelled",
            AgentError::ReactExhausted => "ReactExhausted",
            AgentError::LlmError(_) => "LlmError",
            AgentError::JsonParseError(_) => "JsonParseError",
            AgentError::ConfigError(_) => "ConfigError",
        }
    }

    /// 是否可在 Dispatcher 内按退避策略重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolExecutionFailed(_)
                | AgentError::ToolTimeout(_)
                | AgentError::OutputValidation(_)
        )
    }
}

/// 从 panic 载荷中取出可读消息（工具与钩子的 panic 会被捕获并转为错误）
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_errors_are_not_retryable() {
        assert!(!AgentError::ToolNotFound("x".into()).is_retryable());
        assert!(!AgentError::ToolNotAllowed("x".into()).is_retryable());
        assert!(AgentError::ToolExecutionFailed("boom".into()).is_retryable());
        assert!(AgentError::OutputValidation("bad".into()).is_retryable());
    }

    #[test]
    fn test_display_and_kind() {
        let err = AgentError::ToolNotFound("weather".into());
        assert_eq!(err.to_string(), "Tool not found: weather");
        assert_eq!(err.kind(), "ToolNotFound");
        assert_eq!(AgentError::Timeout(1.5).to_string(), "Run timed out after 1.500s");
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("tool bug")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "tool bug");
        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");
    }
}
