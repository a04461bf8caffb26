pub mod config;
pub mod error;
pub mod grid;

pub use config::{Config, EngineConfig};
pub use error::*;
pub use grid::{Grid, GridView, GridViewMut, Range, Subdivide};
