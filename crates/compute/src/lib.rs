pub mod combiner;
pub mod deadline;
pub mod engine;
pub mod operations;
pub mod scheduler;
pub mod splitter;

pub use combiner::{Combiner, RowBlock, RowBlockAssembly};
pub use deadline::{Deadline, DeadlineGuard};
pub use engine::{matmul_parallel, reduce_parallel, run_parallel};
pub use scheduler::{
    ComputeError, GridOperation, Invocation, InvocationStats, LeafContext, LeafError, Outcome,
    ReduceOperation, RunStatus, Scheduler, SchedulerConfig, SchedulerMetrics,
};
pub use splitter::{Division, SplitPolicy, Splitter};
