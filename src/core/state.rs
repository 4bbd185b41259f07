//! 运行阶段
//!
//! INIT → PRE_HOOKS → PLANNING → EXECUTING(i) → REFLECTING → POST_HOOKS → DONE | FAILED

use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum RunPhase {
    Init,
    PreHooks,
    Planning,
    Executing { step: usize },
    Reflecting,
    PostHooks,
    Done,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Init => write!(f, "INIT"),
            RunPhase::PreHooks => write!(f, "PRE_HOOKS"),
            RunPhase::Planning => write!(f, "PLANNING"),
            RunPhase::Executing { step } => write!(f, "EXECUTING({})", step),
            RunPhase::Reflecting => write!(f, "REFLECTING"),
            RunPhase::PostHooks => write!(f, "POST_HOOKS"),
            RunPhase::Done => write!(f, "DONE"),
            RunPhase::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_terminal() {
        assert_eq!(RunPhase::Executing { step: 2 }.to_string(), "EXECUTING(2)");
        assert!(RunPhase::Failed.is_terminal());
        assert!(!RunPhase::Reflecting.is_terminal());
        assert_eq!(
            serde_json::to_value(RunPhase::Executing { step: 1 }).unwrap(),
            serde_json::json!({"phase": "executing", "step": 1})
        );
    }
}
