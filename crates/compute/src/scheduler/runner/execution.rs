use std::sync::atomic::Ordering;
use std::time::Instant;

use chrono::Utc;
use forkgrid_core::{Grid, Range, Subdivide};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::deadline::{Deadline, DeadlineGuard};
use crate::scheduler::task::{ComputeError, GridOperation, LeafContext, LeafError, ReduceOperation, WorkUnit};
use crate::scheduler::types::{Invocation, InvocationStats, Outcome, RunStatus};
use crate::splitter::Splitter;

use super::fork_join::{ForkJoin, UnitOutcome};
use super::Scheduler;

impl Scheduler {
    /// Apply `op` in place to every cell of `grid`, using the configured
    /// deadline (if any) starting now.
    pub fn for_each<T, O>(&self, grid: &mut Grid<T>, op: &O) -> Result<Invocation<()>, ComputeError>
    where
        T: Send,
        O: GridOperation<T> + ?Sized,
    {
        let deadline = self.config.deadline_from_now();
        self.for_each_with_deadline(grid, op, deadline)
    }

    pub fn for_each_with_deadline<T, O>(
        &self,
        grid: &mut Grid<T>,
        op: &O,
        deadline: Option<Deadline>,
    ) -> Result<Invocation<()>, ComputeError>
    where
        T: Send,
        O: GridOperation<T> + ?Sized,
    {
        let range = grid.full_range();
        self.for_each_in(grid, range, op, deadline)
    }

    /// Apply `op` in place to the cells of `range` only. The range is
    /// validated against the grid before anything is scheduled.
    pub fn for_each_in<T, O>(
        &self,
        grid: &mut Grid<T>,
        range: Range,
        op: &O,
        deadline: Option<Deadline>,
    ) -> Result<Invocation<()>, ComputeError>
    where
        T: Send,
        O: GridOperation<T> + ?Sized,
    {
        let splitter = Splitter::new(op.split_policy(), self.config.threshold)?;
        let view = grid.view_range_mut(range)?;
        self.invoke(
            op.name(),
            splitter,
            view,
            deadline,
            |mut view, cx| op.apply(&mut view, cx),
            |_, _| (),
        )
    }

    /// Reduce `grid` with `op`, using the configured deadline (if any)
    /// starting now.
    pub fn reduce<T, O>(&self, grid: &Grid<T>, op: &O) -> Result<Invocation<O::Partial>, ComputeError>
    where
        T: Sync,
        O: ReduceOperation<T> + ?Sized,
    {
        let deadline = self.config.deadline_from_now();
        self.reduce_with_deadline(grid, op, deadline)
    }

    pub fn reduce_with_deadline<T, O>(
        &self,
        grid: &Grid<T>,
        op: &O,
        deadline: Option<Deadline>,
    ) -> Result<Invocation<O::Partial>, ComputeError>
    where
        T: Sync,
        O: ReduceOperation<T> + ?Sized,
    {
        let range = grid.full_range();
        self.reduce_in(grid, range, op, deadline)
    }

    /// Reduce only the cells of `range`.
    pub fn reduce_in<T, O>(
        &self,
        grid: &Grid<T>,
        range: Range,
        op: &O,
        deadline: Option<Deadline>,
    ) -> Result<Invocation<O::Partial>, ComputeError>
    where
        T: Sync,
        O: ReduceOperation<T> + ?Sized,
    {
        let splitter = Splitter::new(op.split_policy(), self.config.threshold)?;
        let view = grid.view_range(range)?;
        self.invoke(
            op.name(),
            splitter,
            view,
            deadline,
            |view, cx| op.leaf(&view, cx),
            |left, right| op.combine(left, right),
        )
    }

    /// Run one root unit to completion on the pool and turn the result into
    /// an [`Invocation`]. The calling thread blocks inside `install` until
    /// the whole tree has settled.
    fn invoke<V, R, L, C>(
        &self,
        operation: &str,
        splitter: Splitter,
        view: V,
        deadline: Option<Deadline>,
        leaf: L,
        combine: C,
    ) -> Result<Invocation<R>, ComputeError>
    where
        V: Subdivide + Send,
        R: Send,
        L: Fn(V, &LeafContext<'_>) -> Result<R, LeafError> + Sync,
        C: Fn(R, R) -> R + Sync,
    {
        let id = Uuid::new_v4();
        let root = view.range();
        let span = info_span!("invoke", %id, op = operation, range = %root);
        let _enter = span.enter();

        let started_at = Utc::now();
        let start = Instant::now();
        let guard = DeadlineGuard::new(deadline);
        let fork_join = ForkJoin::new(id, splitter, &guard);

        let result = self
            .pool
            .install(|| fork_join.run(WorkUnit::root(view), &leaf, &combine));

        let stats = InvocationStats {
            operation: operation.to_string(),
            started_at,
            elapsed: start.elapsed(),
            leaves_executed: fork_join.leaves_executed.load(Ordering::Relaxed),
            leaves_failed: fork_join.leaves_failed.load(Ordering::Relaxed),
            units_aborted: fork_join.units_aborted.load(Ordering::Relaxed),
            splits: fork_join.splits.load(Ordering::Relaxed),
            max_depth: fork_join.max_depth.load(Ordering::Relaxed),
            elements_processed: fork_join.elements_processed.load(Ordering::Relaxed),
            total_elements: root.area(),
        };
        let deadline_exceeded = guard.tripped();

        if let Some((range, message)) = fork_join.take_failure() {
            warn!(
                %range,
                failed = stats.leaves_failed,
                deadline_exceeded,
                "leaf failed: {}", message
            );
            self.record(operation, stats.elapsed, RunStatus::Failed, stats.leaves_executed);
            return Err(ComputeError::LeafExecution {
                range,
                message,
                deadline_exceeded,
            });
        }

        let outcome = match result {
            UnitOutcome::Completed(value) if !deadline_exceeded => Outcome::Completed(value),
            _ => Outcome::DeadlineExceeded,
        };

        if outcome.is_completed() {
            info!(
                "{} completed in {:.1}ms: {} leaves, {} splits, depth {}",
                operation,
                stats.elapsed.as_secs_f64() * 1000.0,
                stats.leaves_executed,
                stats.splits,
                stats.max_depth
            );
        } else {
            warn!(
                "{} hit its deadline after {:.1}ms: {} leaves done, {} units skipped, {:.1}% of cells processed",
                operation,
                stats.elapsed.as_secs_f64() * 1000.0,
                stats.leaves_executed,
                stats.units_aborted,
                stats.completion() * 100.0
            );
        }

        self.record(operation, stats.elapsed, outcome.status(), stats.leaves_executed);
        Ok(Invocation { id, outcome, stats })
    }
}
