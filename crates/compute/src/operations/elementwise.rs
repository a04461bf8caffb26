use forkgrid_core::GridViewMut;

use crate::scheduler::task::{GridOperation, LeafContext, LeafError};
use crate::splitter::SplitPolicy;

/// Multiply every cell by a constant factor.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    pub factor: f64,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl GridOperation<f64> for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn apply(&self, view: &mut GridViewMut<'_, f64>, _cx: &LeafContext<'_>) -> Result<(), LeafError> {
        for (_, row) in view.rows_mut() {
            for v in row.iter_mut() {
                *v *= self.factor;
            }
        }
        Ok(())
    }
}

/// Replace every cell with its square.
#[derive(Debug, Clone, Copy, Default)]
pub struct Square;

impl GridOperation<f64> for Square {
    fn name(&self) -> &str {
        "square"
    }

    fn apply(&self, view: &mut GridViewMut<'_, f64>, _cx: &LeafContext<'_>) -> Result<(), LeafError> {
        for (_, row) in view.rows_mut() {
            for v in row.iter_mut() {
                *v *= *v;
            }
        }
        Ok(())
    }
}

/// Any pure per-cell function, named for logs and metrics.
pub struct MapFn<F> {
    name: String,
    policy: SplitPolicy,
    f: F,
}

impl<F> MapFn<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            policy: SplitPolicy::Rows,
            f,
        }
    }

    pub fn with_policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<T, F> GridOperation<T> for MapFn<F>
where
    T: Copy,
    F: Fn(T) -> T + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn split_policy(&self) -> SplitPolicy {
        self.policy
    }

    fn apply(&self, view: &mut GridViewMut<'_, T>, _cx: &LeafContext<'_>) -> Result<(), LeafError> {
        view.for_each_mut(|_, _, v| *v = (self.f)(*v));
        Ok(())
    }
}
