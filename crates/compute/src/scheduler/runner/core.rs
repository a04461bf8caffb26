use std::sync::{Arc, RwLock};

use tracing::info;

use crate::scheduler::metrics::SchedulerMetrics;
use crate::scheduler::task::ComputeError;
use crate::scheduler::types::{RunStatus, SchedulerConfig};

/// The fork-join scheduler. Owns a fixed-size work-stealing pool and runs
/// grid operations over it.
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    /// Worker pool; idle workers steal pending children from busy ones.
    pub(super) pool: rayon::ThreadPool,
    /// Scheduler metrics.
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
}

impl Scheduler {
    /// Create a new scheduler and its worker pool.
    pub fn new(config: SchedulerConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        let num_workers = config.resolved_worker_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("forkgrid-worker-{}", i))
            .build()
            .map_err(|e| ComputeError::ThreadPool(e.to_string()))?;

        info!(
            "Scheduler starting with {} workers, threshold {}",
            num_workers, config.threshold
        );

        Ok(Self {
            config,
            pool,
            metrics: Arc::new(RwLock::new(SchedulerMetrics::default())),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of worker threads actually running.
    pub fn pool_size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        match self.metrics.read() {
            Ok(m) => m.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Get an Arc to the metrics (for external reads without cloning).
    pub fn metrics_handle(&self) -> Arc<RwLock<SchedulerMetrics>> {
        Arc::clone(&self.metrics)
    }

    pub(super) fn record(&self, operation: &str, elapsed: std::time::Duration, status: RunStatus, leaves: usize) {
        if let Ok(mut m) = self.metrics.write() {
            m.record_invocation(operation, elapsed, status, leaves);
        }
    }
}
