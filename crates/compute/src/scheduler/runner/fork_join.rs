use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use forkgrid_core::{Range, Subdivide};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::deadline::DeadlineGuard;
use crate::scheduler::task::{Children, LeafContext, LeafError, Task, WorkUnit};
use crate::splitter::Splitter;

/// How a subtree finished. Failure details live in [`ForkJoin`], not here.
#[derive(Debug)]
pub(super) enum UnitOutcome<R> {
    Completed(R),
    Aborted,
    Failed,
}

/// State shared by every unit of one invocation.
pub(super) struct ForkJoin<'g> {
    pub(super) id: Uuid,
    pub(super) splitter: Splitter,
    pub(super) guard: &'g DeadlineGuard,
    first_failure: Mutex<Option<(Range, String)>>,
    pub(super) leaves_executed: AtomicUsize,
    pub(super) leaves_failed: AtomicUsize,
    pub(super) units_aborted: AtomicUsize,
    pub(super) splits: AtomicUsize,
    pub(super) max_depth: AtomicUsize,
    pub(super) elements_processed: AtomicUsize,
}

impl<'g> ForkJoin<'g> {
    pub(super) fn new(id: Uuid, splitter: Splitter, guard: &'g DeadlineGuard) -> Self {
        Self {
            id,
            splitter,
            guard,
            first_failure: Mutex::new(None),
            leaves_executed: AtomicUsize::new(0),
            leaves_failed: AtomicUsize::new(0),
            units_aborted: AtomicUsize::new(0),
            splits: AtomicUsize::new(0),
            max_depth: AtomicUsize::new(0),
            elements_processed: AtomicUsize::new(0),
        }
    }

    /// Run a unit and everything below it. Returns once the whole subtree
    /// has settled; children run through `rayon::join`, so a waiting parent
    /// keeps its worker busy with other pending units.
    pub(super) fn run<V, R, L, C>(&self, unit: WorkUnit<V>, leaf: &L, combine: &C) -> UnitOutcome<R>
    where
        V: Subdivide + Send,
        R: Send,
        L: Fn(V, &LeafContext<'_>) -> Result<R, LeafError> + Sync,
        C: Fn(R, R) -> R + Sync,
    {
        if self.guard.check() {
            self.units_aborted.fetch_add(1, Ordering::Relaxed);
            trace!(invocation = %self.id, range = %unit.range(), "deadline passed, unit skipped");
            return UnitOutcome::Aborted;
        }
        self.max_depth.fetch_max(unit.depth, Ordering::Relaxed);

        let range = unit.range();
        let depth = unit.depth;
        match unit.plan(&self.splitter) {
            Task::Leaf(unit) => self.run_leaf(unit, leaf),
            Task::Split(children) => {
                self.splits.fetch_add(1, Ordering::Relaxed);
                debug!(invocation = %self.id, range = %range, depth, "split");
                match children {
                    Children::Halves(a, b) => {
                        let (left, right) = rayon::join(
                            || self.run(a, leaf, combine),
                            || self.run(b, leaf, combine),
                        );
                        merge(left, right, combine)
                    }
                    Children::Quadrants(tl, tr, bl, br) => {
                        let (top, bottom) = rayon::join(
                            || {
                                let (l, r) = rayon::join(
                                    || self.run(tl, leaf, combine),
                                    || self.run(tr, leaf, combine),
                                );
                                merge(l, r, combine)
                            },
                            || {
                                let (l, r) = rayon::join(
                                    || self.run(bl, leaf, combine),
                                    || self.run(br, leaf, combine),
                                );
                                merge(l, r, combine)
                            },
                        );
                        merge(top, bottom, combine)
                    }
                }
            }
        }
    }

    fn run_leaf<V, R, L>(&self, unit: WorkUnit<V>, leaf: &L) -> UnitOutcome<R>
    where
        V: Subdivide,
        L: Fn(V, &LeafContext<'_>) -> Result<R, LeafError>,
    {
        let range = unit.range();
        let cx = LeafContext::new(range, unit.depth, self.guard);
        trace!(invocation = %self.id, range = %range, depth = unit.depth, "leaf");

        let view = unit.view;
        match panic::catch_unwind(AssertUnwindSafe(|| leaf(view, &cx))) {
            Ok(Ok(value)) => {
                self.leaves_executed.fetch_add(1, Ordering::Relaxed);
                self.elements_processed.fetch_add(range.area(), Ordering::Relaxed);
                UnitOutcome::Completed(value)
            }
            Ok(Err(LeafError::Cancelled)) => {
                self.guard.trip();
                self.units_aborted.fetch_add(1, Ordering::Relaxed);
                UnitOutcome::Aborted
            }
            Ok(Err(LeafError::Failed(message))) => self.fail(range, message),
            Err(payload) => self.fail(range, panic_message(payload.as_ref())),
        }
    }

    fn fail<R>(&self, range: Range, message: String) -> UnitOutcome<R> {
        self.leaves_failed.fetch_add(1, Ordering::Relaxed);
        let mut slot = self
            .first_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            *slot = Some((range, message));
        }
        UnitOutcome::Failed
    }

    /// The first leaf failure observed, if any.
    pub(super) fn take_failure(&self) -> Option<(Range, String)> {
        self.first_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Combine only when both sides completed; a failure anywhere wins over an
/// abort so the parent never produces a partial value.
fn merge<R, C>(left: UnitOutcome<R>, right: UnitOutcome<R>, combine: &C) -> UnitOutcome<R>
where
    C: Fn(R, R) -> R,
{
    match (left, right) {
        (UnitOutcome::Completed(l), UnitOutcome::Completed(r)) => UnitOutcome::Completed(combine(l, r)),
        (UnitOutcome::Failed, _) | (_, UnitOutcome::Failed) => UnitOutcome::Failed,
        _ => UnitOutcome::Aborted,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
