//! End-to-end runs through the public API.

use std::time::{Duration, Instant};

use forkgrid_compute::operations::{BlockSum, MapFn, Scale};
use forkgrid_compute::{
    matmul_parallel, reduce_parallel, run_parallel, Combiner, ComputeError, Deadline, Division,
    GridOperation, LeafContext, LeafError, Outcome, Scheduler, SchedulerConfig, SplitPolicy, Splitter,
};
use forkgrid_core::{CoreError, Grid, GridViewMut, Range};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn scheduler(workers: usize, threshold: usize) -> Scheduler {
    Scheduler::new(SchedulerConfig {
        worker_threads: workers,
        threshold,
        deadline_ms: None,
    })
    .unwrap()
}

/// Doubles cells after a pause, so deadlines land between leaves.
struct SlowDouble(Duration);

impl GridOperation<f64> for SlowDouble {
    fn name(&self) -> &str {
        "slow_double"
    }

    fn apply(&self, view: &mut GridViewMut<'_, f64>, _cx: &LeafContext<'_>) -> Result<(), LeafError> {
        std::thread::sleep(self.0);
        view.for_each_mut(|_, _, v| *v *= 2.0);
        Ok(())
    }
}

#[test]
fn four_by_four_ones_doubled_on_every_pool_size() {
    let expected = Grid::new(4, 4, 2.0).unwrap();
    let mut results = Vec::new();
    for workers in [1, 2, 8] {
        let mut grid = Grid::new(4, 4, 1.0).unwrap();
        let inv = scheduler(workers, 1).for_each(&mut grid, &Scale::new(2.0)).unwrap();
        assert_eq!(inv.outcome, Outcome::Completed(()));
        results.push(grid);
    }
    assert!(results.iter().all(|g| *g == expected));
}

#[test]
fn thousand_rows_with_early_deadline_leave_rows_unmodified() {
    let mut grid = Grid::new(1000, 16, 1.0).unwrap();
    let s = scheduler(2, 100);
    let inv = s
        .for_each_with_deadline(&mut grid, &SlowDouble(Duration::from_millis(30)), Some(Deadline::after_millis(10)))
        .unwrap();

    assert_eq!(inv.outcome, Outcome::DeadlineExceeded);
    let unmodified = (0..1000)
        .filter(|&r| grid.row(r).unwrap().iter().all(|&v| v == 1.0))
        .count();
    assert!(unmodified > 0);
    assert!(inv.stats.completion() < 1.0);
}

#[test]
fn past_deadline_mutates_nothing() {
    let mut grid = Grid::new(64, 64, 3.0).unwrap();
    let past = Deadline::at(Instant::now() - Duration::from_secs(1));
    let outcome = run_parallel(&mut grid, &Scale::new(0.0), 8, Some(past)).unwrap();
    assert_eq!(outcome, Outcome::DeadlineExceeded);
    assert_eq!(grid, Grid::new(64, 64, 3.0).unwrap());
}

#[test]
fn parallel_elementwise_equals_sequential() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..5 {
        let rows = rng.gen_range(1..200);
        let cols = rng.gen_range(1..200);
        let threshold = rng.gen_range(1..300);
        let original: Grid<f64> = Grid::from_fn(rows, cols, |_, _| rng.gen_range(-1e3..1e3)).unwrap();

        let sequential = Grid::from_vec(rows, cols, original.as_slice().iter().map(|v| v.sin() * 2.0).collect()).unwrap();
        for policy in [SplitPolicy::Rows, SplitPolicy::Quadrants] {
            let mut grid = original.clone();
            let op = MapFn::new("sin2", |v: f64| v.sin() * 2.0).with_policy(policy);
            let outcome = run_parallel(&mut grid, &op, threshold, None).unwrap();
            assert!(outcome.is_completed());
            assert_eq!(grid, sequential, "{}x{} threshold {} {:?}", rows, cols, threshold, policy);
        }
    }
}

#[test]
fn splitting_tiles_random_ranges() {
    fn collect(splitter: &Splitter, range: Range, out: &mut Vec<Range>) {
        match splitter.split(range) {
            Division::Leaf => out.push(range),
            division => {
                for child in division.children() {
                    collect(splitter, *child, out);
                }
            }
        }
    }

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let r0 = rng.gen_range(0..50);
        let c0 = rng.gen_range(0..50);
        let range = Range::new(r0, r0 + rng.gen_range(1..80), c0, c0 + rng.gen_range(1..80)).unwrap();
        let policy = if rng.gen_bool(0.5) { SplitPolicy::Rows } else { SplitPolicy::Quadrants };
        let splitter = Splitter::new(policy, rng.gen_range(1..40)).unwrap();

        let mut leaves = Vec::new();
        collect(&splitter, range, &mut leaves);

        assert_eq!(leaves.iter().map(Range::area).sum::<usize>(), range.area());
        for (i, a) in leaves.iter().enumerate() {
            assert!(range.contains(a));
            for b in &leaves[i + 1..] {
                assert!(!a.overlaps(b), "{} overlaps {}", a, b);
            }
        }
    }
}

#[test]
fn block_sum_is_associative_over_random_partitions() {
    let mut rng = StdRng::seed_from_u64(2024);
    let grid = Grid::from_fn(300, 40, |_, _| rng.gen_range(-50..50) as f64).unwrap();
    let total: f64 = grid.as_slice().iter().sum();
    let s = scheduler(4, 16);

    for _ in 0..10 {
        let mut cuts: Vec<usize> = (0..rng.gen_range(1..8)).map(|_| rng.gen_range(1..300)).collect();
        cuts.push(0);
        cuts.push(300);
        cuts.sort_unstable();
        cuts.dedup();

        let partials: Vec<f64> = cuts
            .windows(2)
            .map(|w| {
                let band = Range::new(w[0], w[1], 0, 40).unwrap();
                s.reduce_in(&grid, band, &BlockSum, None)
                    .unwrap()
                    .outcome
                    .completed()
                    .unwrap()
            })
            .collect();

        let left = partials.iter().copied().reduce(|a, b| BlockSum.combine(a, b)).unwrap();
        let right = partials.iter().rev().copied().reduce(|b, a| BlockSum.combine(a, b)).unwrap();
        assert_eq!(left, right);
        assert_eq!(left, total);
    }

    assert_eq!(reduce_parallel(&grid, &BlockSum, 7, None).unwrap(), Outcome::Completed(total));
}

#[test]
fn matmul_against_identity() {
    let mut rng = StdRng::seed_from_u64(3);
    let lhs = Grid::from_fn(90, 20, |_, _| rng.gen_range(-10.0..10.0)).unwrap();
    let identity = Grid::from_fn(20, 20, |r, c| if r == c { 1.0 } else { 0.0 }).unwrap();

    match matmul_parallel(&lhs, &identity, 8, None).unwrap() {
        Outcome::Completed(product) => assert_eq!(product, lhs),
        Outcome::DeadlineExceeded => panic!("no deadline was set"),
    }
}

#[test]
fn matmul_rejects_bad_shapes() {
    let lhs = Grid::new(3, 4, 1.0).unwrap();
    let rhs = Grid::new(3, 4, 1.0).unwrap();
    let err = matmul_parallel(&lhs, &rhs, 1, None).unwrap_err();
    assert!(matches!(err, ComputeError::Core(CoreError::ShapeMismatch(_))));
}

#[test]
fn invalid_inputs_rejected_before_scheduling() {
    assert!(matches!(Range::new(5, 2, 0, 1), Err(CoreError::InvalidRange { .. })));

    let mut grid = Grid::new(2, 2, 1.0).unwrap();
    let err = run_parallel(&mut grid, &Scale::new(2.0), 0, None).unwrap_err();
    assert!(matches!(err, ComputeError::Core(CoreError::InvalidConfig(_))));
    assert_eq!(grid, Grid::new(2, 2, 1.0).unwrap());
}

#[test]
fn leaf_failure_surfaces_with_range() {
    struct FailsOnRow(usize);
    impl GridOperation<f64> for FailsOnRow {
        fn name(&self) -> &str {
            "fails_on_row"
        }
        fn apply(&self, view: &mut GridViewMut<'_, f64>, cx: &LeafContext<'_>) -> Result<(), LeafError> {
            let range = cx.range();
            if (range.row_start()..range.row_end()).contains(&self.0) {
                return Err(LeafError::Failed(format!("bad row {}", self.0)));
            }
            view.for_each_mut(|_, _, v| *v += 1.0);
            Ok(())
        }
    }

    let mut grid = Grid::new(64, 4, 0.0).unwrap();
    let err = run_parallel(&mut grid, &FailsOnRow(40), 8, None).unwrap_err();
    match err {
        ComputeError::LeafExecution { range, message, .. } => {
            assert_eq!(range, Range::new(40, 48, 0, 4).unwrap());
            assert_eq!(message, "bad row 40");
        }
        other => panic!("unexpected error {:?}", other),
    }
    // Unrelated branches completed.
    assert!(grid.row(0).unwrap().iter().all(|&v| v == 1.0));
    assert!(grid.row(63).unwrap().iter().all(|&v| v == 1.0));
    assert!(grid.row(40).unwrap().iter().all(|&v| v == 0.0));
}
