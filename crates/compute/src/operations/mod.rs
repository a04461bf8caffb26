//! Built-in grid operations.

pub mod elementwise;
pub mod reduce;

pub use elementwise::{MapFn, Scale, Square};
pub use reduce::{BlockSum, MatMul};
