use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::RunStatus;

/// Scheduler metrics accumulated across invocations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Total invocations by operation name.
    pub invocations: HashMap<String, u64>,
    /// Invocations by final status.
    pub by_status: HashMap<RunStatus, u64>,
    /// Average invocation duration by operation name.
    pub avg_duration: HashMap<String, Duration>,
    /// Last invocation time by operation name.
    pub last_run: HashMap<String, DateTime<Utc>>,
    /// Leaves executed over the scheduler's lifetime.
    pub leaves_executed: u64,
}

impl SchedulerMetrics {
    /// Record a finished invocation.
    pub fn record_invocation(&mut self, operation: &str, duration: Duration, status: RunStatus, leaves: usize) {
        *self.invocations.entry(operation.to_string()).or_default() += 1;
        *self.by_status.entry(status).or_default() += 1;
        self.leaves_executed += leaves as u64;
        self.last_run.insert(operation.to_string(), Utc::now());

        // Update rolling average duration
        let count = self.invocations[operation];
        let prev_avg = self
            .avg_duration
            .get(operation)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_duration.insert(operation.to_string(), new_avg);
    }

    pub fn count(&self, status: RunStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
