use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid range: rows {row_start}..{row_end}, cols {col_start}..{col_end}")]
    InvalidRange {
        row_start: usize,
        row_end: usize,
        col_start: usize,
        col_end: usize,
    },

    #[error("Invalid grid shape {rows}x{cols} with {len} elements")]
    InvalidShape { rows: usize, cols: usize, len: usize },

    #[error("Range {range} is outside a {rows}x{cols} grid")]
    RangeOutOfBounds {
        range: String,
        rows: usize,
        cols: usize,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
