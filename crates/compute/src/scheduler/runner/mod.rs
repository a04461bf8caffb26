//! Fork-join runner: owns the worker pool and drives the recursion.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor, and accessor methods
//! - `execution`: public entry points and invocation bookkeeping
//! - `fork_join`: the recursive split/run/combine walk over work units

mod core;
mod execution;
mod fork_join;

pub use self::core::Scheduler;
