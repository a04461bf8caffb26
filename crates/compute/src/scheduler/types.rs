use std::time::Duration;

use chrono::{DateTime, Utc};
use forkgrid_core::{CoreError, EngineConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deadline::Deadline;

/// Final state of an invocation that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    Completed(R),
    /// Some unit saw the deadline pass. Grid writes made before that stay in
    /// place; the operation is not atomic.
    DeadlineExceeded,
}

impl<R> Outcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn completed(self) -> Option<R> {
        match self {
            Outcome::Completed(r) => Some(r),
            Outcome::DeadlineExceeded => None,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            Outcome::Completed(_) => RunStatus::Completed,
            Outcome::DeadlineExceeded => RunStatus::DeadlineExceeded,
        }
    }
}

/// Coarse classification used by metrics and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    DeadlineExceeded,
    Failed,
}

/// Counters collected during one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationStats {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub leaves_executed: usize,
    pub leaves_failed: usize,
    /// Units that never started because the deadline had passed.
    pub units_aborted: usize,
    pub splits: usize,
    pub max_depth: usize,
    /// Cells covered by leaves that ran to completion.
    pub elements_processed: usize,
    pub total_elements: usize,
}

impl InvocationStats {
    /// Fraction of the root range covered by completed leaves (0.0 - 1.0).
    pub fn completion(&self) -> f64 {
        if self.total_elements == 0 {
            return 0.0;
        }
        self.elements_processed as f64 / self.total_elements as f64
    }

    /// Completed cells per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.elements_processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Result of one call into the scheduler.
#[derive(Debug, Clone)]
pub struct Invocation<R> {
    pub id: Uuid,
    pub outcome: Outcome<R>,
    pub stats: InvocationStats,
}

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Leaf size: rows under row splitting, cells under quadrant splitting.
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    /// Per-invocation wall-clock budget in milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_worker_threads() -> usize { 0 }
fn default_threshold() -> usize { 64 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            threshold: default_threshold(),
            deadline_ms: None,
        }
    }
}

impl From<&EngineConfig> for SchedulerConfig {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            worker_threads: engine.worker_threads,
            threshold: engine.threshold,
            deadline_ms: engine.deadline_ms,
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(s).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.threshold == 0 {
            return Err(CoreError::InvalidConfig("threshold must be > 0".to_string()));
        }
        if self.deadline_ms == Some(0) {
            return Err(CoreError::InvalidConfig("deadline_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    /// A deadline starting now, if a budget is configured.
    pub fn deadline_from_now(&self) -> Option<Deadline> {
        self.deadline_ms.map(Deadline::after_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults_fill_missing_fields() {
        let config = SchedulerConfig::from_toml_str("threshold = 10\n").unwrap();
        assert_eq!(config.threshold, 10);
        assert_eq!(config.worker_threads, 0);
        assert!(config.deadline_ms.is_none());
        assert!(config.resolved_worker_threads() >= 1);
    }

    #[test]
    fn invalid_toml_values_rejected() {
        assert!(SchedulerConfig::from_toml_str("threshold = 0\n").is_err());
        assert!(SchedulerConfig::from_toml_str("deadline_ms = 0\n").is_err());
        assert!(SchedulerConfig::from_toml_str("threshold = \"ten\"\n").is_err());
    }

    #[test]
    fn converts_from_engine_config() {
        let engine = EngineConfig {
            threshold: 5,
            worker_threads: 3,
            deadline_ms: Some(20),
        };
        let config = SchedulerConfig::from(&engine);
        assert_eq!(config.resolved_worker_threads(), 3);
        assert!(config.deadline_from_now().is_some());
    }

    #[test]
    fn engine_config_is_validated_as_scheduler_config() {
        let zero_threshold = EngineConfig {
            threshold: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            SchedulerConfig::from(&zero_threshold).validate(),
            Err(CoreError::InvalidConfig(_))
        ));

        let zero_deadline = EngineConfig {
            deadline_ms: Some(0),
            ..EngineConfig::default()
        };
        assert!(SchedulerConfig::from(&zero_deadline).validate().is_err());
        assert!(SchedulerConfig::from(&EngineConfig::default()).validate().is_ok());
    }

    #[test]
    fn completion_ratio() {
        let stats = InvocationStats {
            operation: "x".to_string(),
            started_at: Utc::now(),
            elapsed: Duration::from_millis(10),
            leaves_executed: 1,
            leaves_failed: 0,
            units_aborted: 1,
            splits: 1,
            max_depth: 1,
            elements_processed: 25,
            total_elements: 100,
        };
        assert!((stats.completion() - 0.25).abs() < f64::EPSILON);
        assert!(stats.throughput() > 0.0);
    }
}
