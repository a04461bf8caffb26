use forkgrid_core::{CoreError, Grid, GridView, Range};

use crate::combiner::{Combiner, RowBlock, RowBlockAssembly};
use crate::scheduler::task::{LeafContext, LeafError, ReduceOperation};
use crate::splitter::SplitPolicy;

/// Sum of every cell, reduced over quadrants.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockSum;

impl Combiner for BlockSum {
    type Partial = f64;

    fn combine(&self, left: f64, right: f64) -> f64 {
        left + right
    }
}

impl ReduceOperation<f64> for BlockSum {
    fn name(&self) -> &str {
        "block_sum"
    }

    fn leaf(&self, view: &GridView<'_, f64>, _cx: &LeafContext<'_>) -> Result<f64, LeafError> {
        Ok(view.iter().sum())
    }
}

/// `lhs x rhs`, where the scheduler walks `lhs` by row bands and each leaf
/// produces the matching band of the product.
#[derive(Debug, Clone, Copy)]
pub struct MatMul<'a> {
    rhs: &'a Grid<f64>,
}

impl<'a> MatMul<'a> {
    /// Fails unless `lhs.cols() == rhs.rows()`.
    pub fn new(lhs: &Grid<f64>, rhs: &'a Grid<f64>) -> Result<Self, CoreError> {
        if lhs.cols() != rhs.rows() {
            return Err(CoreError::ShapeMismatch(format!(
                "cannot multiply {}x{} by {}x{}",
                lhs.rows(),
                lhs.cols(),
                rhs.rows(),
                rhs.cols()
            )));
        }
        Ok(Self { rhs })
    }

    fn band(&self, view: &GridView<'_, f64>, range: Range, cx: &LeafContext<'_>) -> Result<RowBlock, LeafError> {
        let width = self.rhs.cols();
        let mut data = Vec::with_capacity(range.rows() * width);
        for (_, lhs_row) in view.rows() {
            // Rows are the natural checkpoint; a band can be long.
            if cx.deadline_expired() {
                return Err(LeafError::Cancelled);
            }
            let mut out = vec![0.0; width];
            for (k, a) in lhs_row.iter().enumerate() {
                let rhs_row = self
                    .rhs
                    .row(k)
                    .ok_or_else(|| LeafError::Failed(format!("rhs has no row {}", k)))?;
                for (o, b) in out.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
            data.extend(out);
        }
        Ok(RowBlock {
            row_start: range.row_start(),
            row_end: range.row_end(),
            cols: width,
            data,
        })
    }
}

impl Combiner for MatMul<'_> {
    type Partial = RowBlock;

    fn combine(&self, upper: RowBlock, lower: RowBlock) -> RowBlock {
        RowBlockAssembly.combine(upper, lower)
    }
}

impl ReduceOperation<f64> for MatMul<'_> {
    fn name(&self) -> &str {
        "matmul"
    }

    fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::Rows
    }

    fn leaf(&self, view: &GridView<'_, f64>, cx: &LeafContext<'_>) -> Result<RowBlock, LeafError> {
        let range = cx.range();
        if range.cols() != self.rhs.rows() {
            return Err(LeafError::Failed(format!(
                "band {} does not span the {} shared columns",
                range,
                self.rhs.rows()
            )));
        }
        self.band(view, range, cx)
    }
}
