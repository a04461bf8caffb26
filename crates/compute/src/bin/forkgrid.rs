//! forkgrid: run one grid operation on the fork-join scheduler and report
//! how it went.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info};

use forkgrid_compute::operations::{BlockSum, MatMul, Scale, Square};
use forkgrid_compute::{Deadline, InvocationStats, Outcome, RunStatus, Scheduler, SchedulerConfig};
use forkgrid_core::config::{load_dotenv, Config};
use forkgrid_core::Grid;

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(ValueEnum, Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Op {
    /// Double every cell in place.
    Double,
    /// Square every cell in place.
    Square,
    /// Sum every cell.
    Sum,
    /// Multiply the grid by a random cols x cols matrix.
    Matmul,
}

/// Divide-and-conquer grid engine.
#[derive(Parser, Debug)]
#[command(name = "forkgrid", version, about)]
struct Cli {
    /// Grid rows.
    #[arg(long, default_value_t = 1000)]
    rows: usize,

    /// Grid columns.
    #[arg(long, default_value_t = 1000)]
    cols: usize,

    /// Seed for the random grid (random when unset).
    #[arg(long)]
    seed: Option<u64>,

    /// Operation to run.
    #[arg(long, value_enum, default_value_t = Op::Double)]
    op: Op,

    /// Leaf threshold (overrides FORKGRID_THRESHOLD).
    #[arg(long)]
    threshold: Option<usize>,

    /// Worker threads, 0 = all cores (overrides FORKGRID_WORKER_THREADS).
    #[arg(long)]
    workers: Option<usize>,

    /// Wall-clock budget in milliseconds (overrides FORKGRID_DEADLINE_MS).
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Report {
    invocation: String,
    op: Op,
    rows: usize,
    cols: usize,
    threshold: usize,
    workers: usize,
    status: RunStatus,
    elapsed_ms: f64,
    cells_per_sec: f64,
    leaves: usize,
    units_skipped: usize,
    completion_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    config: serde_json::Value,
}

impl Report {
    fn print(&self) {
        println!("invocation   {}", self.invocation);
        println!("operation    {:?} on {}x{}", self.op, self.rows, self.cols);
        println!("pool         {} workers, threshold {}", self.workers, self.threshold);
        println!("outcome      {:?}", self.status);
        println!("elapsed      {:.2} ms", self.elapsed_ms);
        println!("throughput   {:.0} cells/s", self.cells_per_sec);
        println!("leaves       {} ({} units skipped)", self.leaves, self.units_skipped);
        println!("completion   {:.1}%", self.completion_pct);
        if let Some(v) = self.value {
            println!("value        {}", v);
        }
    }
}

fn random_grid(rng: &mut StdRng, rows: usize, cols: usize) -> Result<Grid<f64>> {
    Ok(Grid::from_fn(rows, cols, |_, _| rng.gen_range(0.0..1.0))?)
}

/// The input grid, plus a `cols x cols` right-hand matrix for `matmul`.
fn generate_inputs(op: Op, rows: usize, cols: usize, seed: u64) -> Result<(Grid<f64>, Option<Grid<f64>>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let grid = random_grid(&mut rng, rows, cols)?;
    let rhs = match op {
        Op::Matmul => Some(random_grid(&mut rng, cols, cols)?),
        Op::Double | Op::Square | Op::Sum => None,
    };
    Ok((grid, rhs))
}

fn main() -> Result<()> {
    load_dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter)),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    config.log_summary();

    run(&cli, &config).map_err(|e| {
        error!("{:#}", e);
        e
    })
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    let mut scheduler_config = SchedulerConfig::from(&config.engine);
    if let Some(threshold) = cli.threshold {
        scheduler_config.threshold = threshold;
    }
    if let Some(workers) = cli.workers {
        scheduler_config.worker_threads = workers;
    }
    if cli.deadline_ms.is_some() {
        scheduler_config.deadline_ms = cli.deadline_ms;
    }

    let scheduler = Scheduler::new(scheduler_config).context("failed to start scheduler")?;

    let seed = cli.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let (mut grid, rhs) = generate_inputs(cli.op, cli.rows, cli.cols, seed)?;
    info!(seed, rows = cli.rows, cols = cli.cols, "inputs generated");

    // The deadline covers only the parallel run, not input generation.
    let deadline = scheduler.config().deadline_ms.map(Deadline::after_millis);
    let (id, stats, status, value) = match cli.op {
        Op::Double => {
            let inv = scheduler
                .for_each_with_deadline(&mut grid, &Scale::new(2.0), deadline)
                .context("double failed")?;
            (inv.id, inv.stats, inv.outcome.status(), None)
        }
        Op::Square => {
            let inv = scheduler
                .for_each_with_deadline(&mut grid, &Square, deadline)
                .context("square failed")?;
            (inv.id, inv.stats, inv.outcome.status(), None)
        }
        Op::Sum => {
            let inv = scheduler
                .reduce_with_deadline(&grid, &BlockSum, deadline)
                .context("sum failed")?;
            let status = inv.outcome.status();
            (inv.id, inv.stats, status, inv.outcome.completed())
        }
        Op::Matmul => {
            let rhs = rhs.as_ref().context("matmul needs a right-hand matrix")?;
            let op = MatMul::new(&grid, rhs)?;
            let inv = scheduler
                .reduce_with_deadline(&grid, &op, deadline)
                .context("matmul failed")?;
            let status = inv.outcome.status();
            let trace = match inv.outcome {
                Outcome::Completed(block) => {
                    let product = block.into_grid()?;
                    Some(
                        (0..product.rows().min(product.cols()))
                            .filter_map(|i| product.get(i, i))
                            .sum::<f64>(),
                    )
                }
                Outcome::DeadlineExceeded => None,
            };
            (inv.id, inv.stats, status, trace)
        }
    };

    let report = build_report(cli, config, &scheduler, id.to_string(), &stats, status, value);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }
    Ok(())
}

fn build_report(
    cli: &Cli,
    config: &Config,
    scheduler: &Scheduler,
    invocation: String,
    stats: &InvocationStats,
    status: RunStatus,
    value: Option<f64>,
) -> Report {
    Report {
        invocation,
        op: cli.op,
        rows: cli.rows,
        cols: cli.cols,
        threshold: scheduler.config().threshold,
        workers: scheduler.pool_size(),
        status,
        elapsed_ms: stats.elapsed.as_secs_f64() * 1000.0,
        cells_per_sec: stats.throughput(),
        leaves: stats.leaves_executed,
        units_skipped: stats.units_aborted,
        completion_pct: stats.completion() * 100.0,
        value,
        config: config.summary_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_inputs_include_square_rhs() {
        let (grid, rhs) = generate_inputs(Op::Matmul, 6, 4, 9).unwrap();
        assert_eq!(grid.shape(), (6, 4));
        assert_eq!(rhs.map(|g| g.shape()), Some((4, 4)));
    }

    #[test]
    fn elementwise_inputs_have_no_rhs() {
        for op in [Op::Double, Op::Square, Op::Sum] {
            let (grid, rhs) = generate_inputs(op, 3, 5, 1).unwrap();
            assert_eq!(grid.shape(), (3, 5));
            assert!(rhs.is_none());
        }
    }

    #[test]
    fn same_seed_same_inputs() {
        let (a, _) = generate_inputs(Op::Sum, 8, 8, 42).unwrap();
        let (b, _) = generate_inputs(Op::Sum, 8, 8, 42).unwrap();
        assert_eq!(a, b);
    }
}
