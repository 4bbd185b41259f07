//! 可观测性：tracing 订阅器初始化
//!
//! RUST_LOG 优先，否则使用传入级别（默认 info）。重复初始化时静默忽略，便于测试与嵌入。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},stepwise={}", level, level)))
}

/// 人类可读输出
pub fn init() {
    init_with_level("info");
}

pub fn init_with_level(level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_target(false))
        .try_init()
        .ok();
}

/// JSON 输出，配合 Dispatcher 的 tool_audit 行做结构化审计
pub fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().json().with_current_span(true))
        .try_init()
        .ok();
}
