//! 运行指标：完成任务数、累计步数、平均耗时（增量均值）

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub total_steps: u64,
    /// 秒
    pub average_time: f64,
}

impl AgentMetrics {
    /// average' = (average·(n−1) + elapsed) / n
    pub fn record_task(&mut self, elapsed_secs: f64) {
        self.tasks_completed += 1;
        let n = self.tasks_completed as f64;
        self.average_time = (self.average_time * (n - 1.0) + elapsed_secs) / n;
    }

    pub fn record_step(&mut self) {
        self.total_steps += 1;
    }
}
