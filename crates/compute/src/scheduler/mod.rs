//! Fork-join scheduler over a work-stealing pool, with cooperative deadlines.
//!
//! The caller submits one root unit covering a grid (or a sub-range of it).
//! Units larger than the threshold are split by the [`Splitter`] and their
//! children run concurrently; parents wait for both sides before reporting.
//! Every unit checks the shared [`DeadlineGuard`] before doing anything.
//!
//! [`Splitter`]: crate::splitter::Splitter
//! [`DeadlineGuard`]: crate::deadline::DeadlineGuard

pub mod metrics;
pub mod runner;
pub mod task;
pub mod types;

pub use metrics::SchedulerMetrics;
pub use runner::Scheduler;
pub use task::{Children, ComputeError, GridOperation, LeafContext, LeafError, ReduceOperation, Task, WorkUnit};
pub use types::{Invocation, InvocationStats, Outcome, RunStatus, SchedulerConfig};
