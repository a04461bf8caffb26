//! Merging of sibling partial results for reduction operations.
//!
//! The scheduler always passes the lower-index child as `left`. Quadrant
//! results are folded as `combine(combine(tl, tr), combine(bl, br))`.

use forkgrid_core::{CoreError, Grid};
use serde::Serialize;

/// Associative merge of two sibling partial results.
pub trait Combiner: Send + Sync {
    type Partial: Send;

    fn combine(&self, left: Self::Partial, right: Self::Partial) -> Self::Partial;
}

/// A horizontal band `[row_start, row_end)` of a result matrix, every column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowBlock {
    pub row_start: usize,
    pub row_end: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl RowBlock {
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    /// Convert into a grid. Fails unless the block starts at row 0.
    pub fn into_grid(self) -> Result<Grid<f64>, CoreError> {
        if self.row_start != 0 {
            return Err(CoreError::ShapeMismatch(format!(
                "row block starts at {}, expected 0",
                self.row_start
            )));
        }
        Grid::from_vec(self.rows(), self.cols, self.data)
    }
}

/// Stacks adjacent row blocks, upper block first.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowBlockAssembly;

impl Combiner for RowBlockAssembly {
    type Partial = RowBlock;

    fn combine(&self, mut upper: RowBlock, lower: RowBlock) -> RowBlock {
        debug_assert_eq!(upper.row_end, lower.row_start, "row blocks must be adjacent");
        debug_assert_eq!(upper.cols, lower.cols, "row blocks must share width");
        upper.row_end = lower.row_end;
        upper.data.extend(lower.data);
        upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(row_start: usize, rows: usize, cols: usize) -> RowBlock {
        RowBlock {
            row_start,
            row_end: row_start + rows,
            cols,
            data: (0..rows * cols).map(|i| (row_start * cols + i) as f64).collect(),
        }
    }

    #[test]
    fn row_blocks_assemble_in_order() {
        let c = RowBlockAssembly;
        let left_first = c.combine(c.combine(block(0, 1, 3), block(1, 2, 3)), block(3, 1, 3));
        let right_first = c.combine(block(0, 1, 3), c.combine(block(1, 2, 3), block(3, 1, 3)));
        assert_eq!(left_first, right_first);
        assert_eq!(left_first, block(0, 4, 3));

        let grid = left_first.into_grid().unwrap();
        assert_eq!(grid.shape(), (4, 3));
        assert_eq!(grid.get(3, 2), Some(&11.0));
    }

    #[test]
    fn partial_block_is_not_a_grid() {
        assert!(block(2, 1, 3).into_grid().is_err());
    }
}
