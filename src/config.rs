//! 配置：Agent 运行参数与 LLM 后端选择
//!
//! 加载顺序：先读 config/default.toml（若存在），再叠加显式传入的文件，最后用环境变量 `STEPWISE__*` 覆盖
//! （双下划线表示嵌套，如 `STEPWISE__AGENT__MAX_RETRIES=2`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// max_retries 允许的上限
pub const MAX_RETRIES_LIMIT: u8 = 5;

/// Agent 配置；一个 Agent 实例生命周期内不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    /// 失败操作的额外重试次数（0..=5）
    pub max_retries: u8,
    /// 执行结束后是否进行反思
    pub reflection_enabled: bool,
    /// 单次 run 的最长时间（秒）
    pub timeout_secs: f64,
    /// 允许使用的工具；为空表示全部允许
    pub allowed_tools: Vec<String>,
    /// 是否按工具声明的输出 schema 严格校验
    pub strict_validation: bool,
    /// 短期记忆容量（滚动缓冲区大小）
    pub memory_capacity: usize,
    /// 构造 ToolInput 时检索的上下文条数
    pub context_top_k: usize,
    /// 退避单位（毫秒）：第 a 次失败后等待 a × unit
    pub backoff_unit_ms: u64,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// ReAct 单次 run 的最大迭代数，防止死循环
    pub max_react_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "BasicAgent".to_string(),
            description: "General purpose autonomous agent".to_string(),
            max_retries: 3,
            reflection_enabled: true,
            timeout_secs: 30.0,
            allowed_tools: Vec::new(),
            strict_validation: true,
            memory_capacity: 10,
            context_top_k: 5,
            backoff_unit_ms: 1000,
            tool_timeout_secs: 30,
            max_react_steps: 20,
        }
    }
}

impl AgentConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_reflection(mut self, enabled: bool) -> Self {
        self.reflection_enabled = enabled;
        self
    }

    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_allowed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_backoff_unit_ms(mut self, ms: u64) -> Self {
        self.backoff_unit_ms = ms;
        self
    }

    pub fn with_tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn with_max_react_steps(mut self, steps: usize) -> Self {
        self.max_react_steps = steps;
        self
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(AgentError::ConfigError(format!(
                "max_retries must be within 0..={}, got {}",
                MAX_RETRIES_LIMIT, self.max_retries
            )));
        }
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Err(AgentError::ConfigError(format!(
                "timeout_secs must be a positive number, got {}",
                self.timeout_secs
            )));
        }
        if self.context_top_k == 0 {
            return Err(AgentError::ConfigError("context_top_k must be at least 1".to_string()));
        }
        if self.max_react_steps == 0 {
            return Err(AgentError::ConfigError("max_react_steps must be at least 1".to_string()));
        }
        if self.tool_timeout_secs == 0 {
            return Err(AgentError::ConfigError("tool_timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: 0.0,
        }
    }
}

/// 配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub llm: LlmSection,
}

/// 从 config 目录加载配置，环境变量 STEPWISE__* 可覆盖
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STEPWISE")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("agent.allowed_tools"),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载并校验 Agent 配置
pub fn load_agent_config(config_path: Option<PathBuf>) -> Result<AgentConfig, AgentError> {
    let app = load_config(config_path).map_err(|e| AgentError::ConfigError(e.to_string()))?;
    app.agent.validate()?;
    Ok(app.agent)
}
