//! Leaf-or-split decisions for work units.
//!
//! The splitter only produces ranges that tile their parent exactly: children
//! are pairwise disjoint and their union is the parent. Everything downstream
//! relies on that to hand out mutable views without locking.

use forkgrid_core::{CoreError, Range};
use serde::{Deserialize, Serialize};

/// How a range is cut when it is too large to run as a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Bisect rows only. Leaf size is measured in rows.
    Rows,
    /// Bisect rows and columns. Leaf size is measured in cells.
    Quadrants,
}

/// Result of asking the splitter about one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    Leaf,
    /// Two children, first one on top (or on the left).
    Halves([Range; 2]),
    /// Top-left, top-right, bottom-left, bottom-right.
    Quadrants([Range; 4]),
}

impl Division {
    pub fn children(&self) -> &[Range] {
        match self {
            Division::Leaf => &[],
            Division::Halves(children) => &children[..],
            Division::Quadrants(children) => &children[..],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splitter {
    policy: SplitPolicy,
    threshold: usize,
}

impl Splitter {
    pub fn new(policy: SplitPolicy, threshold: usize) -> Result<Self, CoreError> {
        if threshold == 0 {
            return Err(CoreError::InvalidConfig("threshold must be > 0".to_string()));
        }
        Ok(Self { policy, threshold })
    }

    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn split(&self, range: Range) -> Division {
        match self.policy {
            SplitPolicy::Rows => {
                if range.rows() <= self.threshold || range.rows() == 1 {
                    return Division::Leaf;
                }
                match range.split_rows_at(row_mid(&range)) {
                    Some((top, bottom)) => Division::Halves([top, bottom]),
                    None => Division::Leaf,
                }
            }
            SplitPolicy::Quadrants => {
                if range.area() <= self.threshold || range.area() == 1 {
                    return Division::Leaf;
                }
                quadrants(range)
            }
        }
    }
}

/// First-half size gets the extra unit when the span is odd.
fn midpoint(start: usize, end: usize) -> usize {
    start + (end - start).div_ceil(2)
}

fn row_mid(range: &Range) -> usize {
    midpoint(range.row_start(), range.row_end())
}

fn col_mid(range: &Range) -> usize {
    midpoint(range.col_start(), range.col_end())
}

fn quadrants(range: Range) -> Division {
    let by_rows = range.split_rows_at(row_mid(&range));
    let by_cols = range.split_cols_at(col_mid(&range));
    match (by_rows, by_cols) {
        (Some((top, bottom)), Some(_)) => {
            let at = col_mid(&range);
            match (top.split_cols_at(at), bottom.split_cols_at(at)) {
                (Some((tl, tr)), Some((bl, br))) => Division::Quadrants([tl, tr, bl, br]),
                _ => Division::Halves([top, bottom]),
            }
        }
        // A single row or a single column: bisect the long side only.
        (Some((top, bottom)), None) => Division::Halves([top, bottom]),
        (None, Some((left, right))) => Division::Halves([left, right]),
        (None, None) => Division::Leaf,
    }
}
