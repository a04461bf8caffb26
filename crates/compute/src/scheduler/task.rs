use forkgrid_core::{CoreError, GridView, GridViewMut, Range, Subdivide};

use crate::combiner::Combiner;
use crate::deadline::DeadlineGuard;
use crate::splitter::{Division, SplitPolicy, Splitter};

/// Error type for a parallel invocation.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Leaf {range} failed: {message}")]
    LeafExecution {
        range: Range,
        message: String,
        /// The deadline had also expired somewhere in the same invocation.
        deadline_exceeded: bool,
    },
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Error returned by operation code running on a leaf.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeafError {
    #[error("{0}")]
    Failed(String),
    /// The leaf noticed the deadline and stopped early. Cells it already
    /// wrote keep their new values.
    #[error("leaf cancelled at deadline")]
    Cancelled,
}

/// What a leaf can see about its position in the invocation.
#[derive(Debug)]
pub struct LeafContext<'a> {
    range: Range,
    depth: usize,
    guard: &'a DeadlineGuard,
}

impl<'a> LeafContext<'a> {
    pub(crate) fn new(range: Range, depth: usize, guard: &'a DeadlineGuard) -> Self {
        Self { range, depth, guard }
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Cooperative check for long leaves. Observing expiry here marks the
    /// whole invocation as `DeadlineExceeded`.
    pub fn deadline_expired(&self) -> bool {
        self.guard.check()
    }
}

/// An in-place operation over a rectangular window of the grid.
///
/// Implementations must only touch cells inside the view they are given;
/// the scheduler runs sibling leaves concurrently in no particular order.
pub trait GridOperation<T>: Send + Sync {
    /// Human-readable name for logging and metrics.
    fn name(&self) -> &str;

    fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::Rows
    }

    fn apply(&self, view: &mut GridViewMut<'_, T>, cx: &LeafContext<'_>) -> Result<(), LeafError>;
}

/// A read-only operation producing a value per leaf, merged by its
/// [`Combiner`].
pub trait ReduceOperation<T>: Combiner {
    fn name(&self) -> &str;

    fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::Quadrants
    }

    fn leaf(&self, view: &GridView<'_, T>, cx: &LeafContext<'_>) -> Result<Self::Partial, LeafError>;
}

/// One node of the recursion tree: a view over its range and its depth.
#[derive(Debug)]
pub struct WorkUnit<V> {
    pub view: V,
    pub depth: usize,
}

/// Either run directly or fan out into children.
#[derive(Debug)]
pub enum Task<U> {
    Leaf(U),
    Split(Children<U>),
}

#[derive(Debug)]
pub enum Children<U> {
    Halves(U, U),
    /// Top-left, top-right, bottom-left, bottom-right.
    Quadrants(U, U, U, U),
}

impl<V: Subdivide> WorkUnit<V> {
    pub fn root(view: V) -> Self {
        Self { view, depth: 0 }
    }

    pub fn range(&self) -> Range {
        self.view.range()
    }

    /// Ask the splitter about this unit and carve the view accordingly.
    pub fn plan(self, splitter: &Splitter) -> Task<WorkUnit<V>> {
        let range = self.range();
        let depth = self.depth + 1;
        let child = |view| WorkUnit { view, depth };
        match splitter.split(range) {
            Division::Leaf => Task::Leaf(self),
            Division::Halves([first, _]) => {
                let (a, b) = if first.row_end() < range.row_end() {
                    self.view.split_rows(first.row_end())
                } else {
                    self.view.split_cols(first.col_end())
                };
                Task::Split(Children::Halves(child(a), child(b)))
            }
            Division::Quadrants([tl, ..]) => {
                let (top, bottom) = self.view.split_rows(tl.row_end());
                let (a, b) = top.split_cols(tl.col_end());
                let (c, d) = bottom.split_cols(tl.col_end());
                Task::Split(Children::Quadrants(child(a), child(b), child(c), child(d)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use forkgrid_core::Grid;

    use super::*;

    #[test]
    fn plan_carves_views_matching_splitter() {
        let mut grid = Grid::new(4, 4, 0u8).unwrap();
        let splitter = Splitter::new(SplitPolicy::Quadrants, 4).unwrap();
        let unit = WorkUnit::root(grid.view_mut());
        let expected = splitter.split(unit.range());

        match unit.plan(&splitter) {
            Task::Split(Children::Quadrants(a, b, c, d)) => {
                let got = [a.range(), b.range(), c.range(), d.range()];
                assert_eq!(Division::Quadrants(got), expected);
                assert!([&a, &b, &c, &d].iter().all(|u| u.depth == 1));
            }
            other => panic!("expected quadrants, got {:?}", other),
        }
    }

    #[test]
    fn plan_on_small_unit_is_leaf() {
        let grid = Grid::new(2, 2, 0u8).unwrap();
        let splitter = Splitter::new(SplitPolicy::Rows, 8).unwrap();
        assert!(matches!(
            WorkUnit::root(grid.view()).plan(&splitter),
            Task::Leaf(_)
        ));
    }

    #[test]
    fn column_halves_on_single_row() {
        let grid = Grid::new(1, 5, 0u8).unwrap();
        let splitter = Splitter::new(SplitPolicy::Quadrants, 1).unwrap();
        match WorkUnit::root(grid.view()).plan(&splitter) {
            Task::Split(Children::Halves(a, b)) => {
                assert_eq!(a.range(), Range::new(0, 1, 0, 3).unwrap());
                assert_eq!(b.range(), Range::new(0, 1, 3, 5).unwrap());
            }
            other => panic!("expected halves, got {:?}", other),
        }
    }
}
