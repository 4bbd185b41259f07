//! 重试退避：尝试次数 -> 等待时长，以及可替换的 sleep 抽象
//!
//! Dispatcher 在第 a 次尝试（从 0 计）失败后等待 `policy.delay(a)`，再发起第 a+1 次尝试；
//! 测试中注入 RecordingSleeper，不产生真实等待。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// 退避策略
pub trait BackoffPolicy: Send + Sync {
    /// failed_attempt：刚失败的尝试序号（从 0 计）
    fn delay(&self, failed_attempt: u32) -> Duration;
}

/// 线性退避：`failed_attempt × unit`，即 0, 1·unit, 2·unit, …
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub unit: Duration,
}

impl LinearBackoff {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl BackoffPolicy for LinearBackoff {
    fn delay(&self, failed_attempt: u32) -> Duration {
        self.unit.saturating_mul(failed_attempt)
    }
}

/// sleep 抽象：协作式挂起，只阻塞当前步骤
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// 基于 tokio::time::sleep 的实现
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// 只记录请求的等待时长，立即返回
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
    }
}
