//! In-memory row-major grid plus the range and view types used to hand
//! disjoint pieces of it to parallel workers.
//!
//! A [`GridViewMut`] is a list of row slices already narrowed to its column
//! window. Splitting a view moves those slices into two smaller views, so two
//! views derived from the same parent can never alias.

use std::fmt;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};

// ── Range ─────────────────────────────────────────────────────

/// Half-open rectangle `[row_start, row_end) x [col_start, col_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    row_start: usize,
    row_end: usize,
    col_start: usize,
    col_end: usize,
}

impl Range {
    /// Build a range, rejecting empty or inverted bounds.
    pub fn new(row_start: usize, row_end: usize, col_start: usize, col_end: usize) -> CoreResult<Self> {
        if row_start >= row_end || col_start >= col_end {
            return Err(CoreError::InvalidRange {
                row_start,
                row_end,
                col_start,
                col_end,
            });
        }
        Ok(Self {
            row_start,
            row_end,
            col_start,
            col_end,
        })
    }

    pub fn row_start(&self) -> usize {
        self.row_start
    }

    pub fn row_end(&self) -> usize {
        self.row_end
    }

    pub fn col_start(&self) -> usize {
        self.col_start
    }

    pub fn col_end(&self) -> usize {
        self.col_end
    }

    /// Number of rows covered.
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    /// Number of columns covered.
    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    /// Number of cells covered.
    pub fn area(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &Range) -> bool {
        other.row_start >= self.row_start
            && other.row_end <= self.row_end
            && other.col_start >= self.col_start
            && other.col_end <= self.col_end
    }

    /// Whether the two ranges share at least one cell.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.row_start < other.row_end
            && other.row_start < self.row_end
            && self.col_start < other.col_end
            && other.col_start < self.col_end
    }

    /// Cut into `[row_start, at)` and `[at, row_end)`. `None` unless `at` is
    /// strictly inside the row span.
    pub fn split_rows_at(&self, at: usize) -> Option<(Range, Range)> {
        if at <= self.row_start || at >= self.row_end {
            return None;
        }
        Some((
            Range { row_end: at, ..*self },
            Range { row_start: at, ..*self },
        ))
    }

    /// Cut into `[col_start, at)` and `[at, col_end)`.
    pub fn split_cols_at(&self, at: usize) -> Option<(Range, Range)> {
        if at <= self.col_start || at >= self.col_end {
            return None;
        }
        Some((
            Range { col_end: at, ..*self },
            Range { col_start: at, ..*self },
        ))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..{})x[{}..{})",
            self.row_start, self.row_end, self.col_start, self.col_end
        )
    }
}

// ── Grid ──────────────────────────────────────────────────────

/// Dense `rows x cols` buffer stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Grid with every cell set to `fill`.
    pub fn new(rows: usize, cols: usize, fill: T) -> CoreResult<Self> {
        check_shape(rows, cols, rows.saturating_mul(cols))?;
        Ok(Self {
            rows,
            cols,
            data: vec![fill; rows * cols],
        })
    }
}

impl<T> Grid<T> {
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> CoreResult<Self> {
        check_shape(rows, cols, data.len())?;
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> CoreResult<Self> {
        check_shape(rows, cols, rows.saturating_mul(cols))?;
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> CoreResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != n_cols) {
            return Err(CoreError::ShapeMismatch(format!(
                "row {} has {} columns, expected {}",
                bad,
                rows[bad].len(),
                n_cols
            )));
        }
        let data: Vec<T> = rows.into_iter().flatten().collect();
        Self::from_vec(n_rows, n_cols, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col)
    }

    pub fn row(&self, row: usize) -> Option<&[T]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    /// The range covering every cell.
    pub fn full_range(&self) -> Range {
        Range {
            row_start: 0,
            row_end: self.rows,
            col_start: 0,
            col_end: self.cols,
        }
    }

    /// Read-only view of the whole grid.
    pub fn view(&self) -> GridView<'_, T> {
        GridView {
            data: &self.data,
            stride: self.cols,
            range: self.full_range(),
        }
    }

    /// Read-only view restricted to `range`.
    pub fn view_range(&self, range: Range) -> CoreResult<GridView<'_, T>> {
        self.check_bounds(&range)?;
        Ok(GridView {
            data: &self.data,
            stride: self.cols,
            range,
        })
    }

    /// Exclusive view of the whole grid.
    pub fn view_mut(&mut self) -> GridViewMut<'_, T> {
        let range = self.full_range();
        GridViewMut {
            range,
            rows: self.data.chunks_mut(self.cols).collect(),
        }
    }

    /// Exclusive view restricted to `range`.
    pub fn view_range_mut(&mut self, range: Range) -> CoreResult<GridViewMut<'_, T>> {
        self.check_bounds(&range)?;
        let rows = self
            .data
            .chunks_mut(self.cols)
            .skip(range.row_start)
            .take(range.rows())
            .map(|row| &mut row[range.col_start..range.col_end])
            .collect();
        Ok(GridViewMut { range, rows })
    }

    fn check_bounds(&self, range: &Range) -> CoreResult<()> {
        if self.full_range().contains(range) {
            Ok(())
        } else {
            Err(CoreError::RangeOutOfBounds {
                range: range.to_string(),
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}

fn check_shape(rows: usize, cols: usize, len: usize) -> CoreResult<()> {
    if rows == 0 || cols == 0 || rows.checked_mul(cols) != Some(len) {
        return Err(CoreError::InvalidShape { rows, cols, len });
    }
    Ok(())
}

// ── Views ─────────────────────────────────────────────────────

/// A view that can be cut into two disjoint views along a row or column.
///
/// # Panics
/// Both split methods panic if `at` is not strictly inside the view's span
/// on that axis.
pub trait Subdivide: Sized {
    fn range(&self) -> Range;

    fn split_rows(self, at: usize) -> (Self, Self);

    fn split_cols(self, at: usize) -> (Self, Self);
}

/// Shared view over a rectangular window of a [`Grid`]. Coordinates passed
/// to accessors are absolute grid coordinates.
#[derive(Debug)]
pub struct GridView<'a, T> {
    data: &'a [T],
    stride: usize,
    range: Range,
}

impl<T> Clone for GridView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GridView<'_, T> {}

impl<'a, T> GridView<'a, T> {
    pub fn get(&self, row: usize, col: usize) -> Option<&'a T> {
        if row < self.range.row_start
            || row >= self.range.row_end
            || col < self.range.col_start
            || col >= self.range.col_end
        {
            return None;
        }
        self.data.get(row * self.stride + col)
    }

    /// The part of `row` inside the column window.
    pub fn row(&self, row: usize) -> Option<&'a [T]> {
        if row < self.range.row_start || row >= self.range.row_end {
            return None;
        }
        let base = row * self.stride;
        Some(&self.data[base + self.range.col_start..base + self.range.col_end])
    }

    /// `(row index, row slice)` pairs in row order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &'a [T])> + '_ {
        (self.range.row_start..self.range.row_end)
            .filter_map(move |r| self.row(r).map(|slice| (r, slice)))
    }

    /// Every element of the window, row-major.
    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.rows().flat_map(|(_, row)| row.iter())
    }
}

impl<T> Subdivide for GridView<'_, T> {
    fn range(&self) -> Range {
        self.range
    }

    fn split_rows(self, at: usize) -> (Self, Self) {
        let (top, bottom) = self
            .range
            .split_rows_at(at)
            .unwrap_or_else(|| panic!("split_rows: {} outside {}", at, self.range));
        (
            GridView { range: top, ..self },
            GridView { range: bottom, ..self },
        )
    }

    fn split_cols(self, at: usize) -> (Self, Self) {
        let (left, right) = self
            .range
            .split_cols_at(at)
            .unwrap_or_else(|| panic!("split_cols: {} outside {}", at, self.range));
        (
            GridView { range: left, ..self },
            GridView { range: right, ..self },
        )
    }
}

/// Exclusive view over a rectangular window of a [`Grid`].
#[derive(Debug)]
pub struct GridViewMut<'a, T> {
    range: Range,
    rows: Vec<&'a mut [T]>,
}

impl<'a, T> GridViewMut<'a, T> {
    pub fn row(&self, row: usize) -> Option<&[T]> {
        let idx = row.checked_sub(self.range.row_start)?;
        self.rows.get(idx).map(|r| &**r)
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        let r = row.checked_sub(self.range.row_start)?;
        let c = col.checked_sub(self.range.col_start)?;
        self.rows.get_mut(r)?.get_mut(c)
    }

    /// `(row index, row slice)` pairs in row order.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (usize, &mut [T])> + use<'_, 'a, T> {
        let start = self.range.row_start;
        self.rows
            .iter_mut()
            .enumerate()
            .map(move |(i, row)| (start + i, &mut **row))
    }

    /// Visit every cell with its absolute coordinates.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(usize, usize, &mut T)) {
        let col_start = self.range.col_start;
        for (r, row) in self.rows_mut() {
            for (i, cell) in row.iter_mut().enumerate() {
                f(r, col_start + i, cell);
            }
        }
    }
}

impl<T> Subdivide for GridViewMut<'_, T> {
    fn range(&self) -> Range {
        self.range
    }

    fn split_rows(self, at: usize) -> (Self, Self) {
        let (top, bottom) = self
            .range
            .split_rows_at(at)
            .unwrap_or_else(|| panic!("split_rows: {} outside {}", at, self.range));
        let mut upper = self.rows;
        let lower = upper.split_off(top.rows());
        (
            GridViewMut { range: top, rows: upper },
            GridViewMut { range: bottom, rows: lower },
        )
    }

    fn split_cols(self, at: usize) -> (Self, Self) {
        let (left, right) = self
            .range
            .split_cols_at(at)
            .unwrap_or_else(|| panic!("split_cols: {} outside {}", at, self.range));
        let width = left.cols();
        let mut left_rows = Vec::with_capacity(self.rows.len());
        let mut right_rows = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            let (l, r) = row.split_at_mut(width);
            left_rows.push(l);
            right_rows.push(r);
        }
        (
            GridViewMut { range: left, rows: left_rows },
            GridViewMut { range: right, rows: right_rows },
        )
    }
}
