//! One-shot entry points. Each call builds a pool sized to the machine;
//! hold a [`Scheduler`] instead when invoking repeatedly.

use forkgrid_core::Grid;

use crate::deadline::Deadline;
use crate::operations::MatMul;
use crate::scheduler::{ComputeError, GridOperation, Outcome, ReduceOperation, Scheduler, SchedulerConfig};

fn one_shot(threshold: usize) -> Result<Scheduler, ComputeError> {
    Scheduler::new(SchedulerConfig {
        threshold,
        ..SchedulerConfig::default()
    })
}

/// Apply `op` in place across `grid`.
///
/// On `DeadlineExceeded` the grid holds a mix of processed and untouched
/// cells: leaves that started before expiry ran to completion, later ones
/// never ran.
pub fn run_parallel<T, O>(
    grid: &mut Grid<T>,
    op: &O,
    threshold: usize,
    deadline: Option<Deadline>,
) -> Result<Outcome<()>, ComputeError>
where
    T: Send,
    O: GridOperation<T> + ?Sized,
{
    let scheduler = one_shot(threshold)?;
    Ok(scheduler.for_each_with_deadline(grid, op, deadline)?.outcome)
}

/// Reduce `grid` with `op`, combining sibling results bottom-up.
pub fn reduce_parallel<T, O>(
    grid: &Grid<T>,
    op: &O,
    threshold: usize,
    deadline: Option<Deadline>,
) -> Result<Outcome<O::Partial>, ComputeError>
where
    T: Sync,
    O: ReduceOperation<T> + ?Sized,
{
    let scheduler = one_shot(threshold)?;
    Ok(scheduler.reduce_with_deadline(grid, op, deadline)?.outcome)
}

/// `lhs x rhs`, split into row bands of at most `threshold` rows.
pub fn matmul_parallel(
    lhs: &Grid<f64>,
    rhs: &Grid<f64>,
    threshold: usize,
    deadline: Option<Deadline>,
) -> Result<Outcome<Grid<f64>>, ComputeError> {
    let op = MatMul::new(lhs, rhs)?;
    match reduce_parallel(lhs, &op, threshold, deadline)? {
        Outcome::Completed(block) => Ok(Outcome::Completed(block.into_grid()?)),
        Outcome::DeadlineExceeded => Ok(Outcome::DeadlineExceeded),
    }
}
