use criterion::{criterion_group, criterion_main, Criterion};
use mini_threes::bag::BagConfig;
use mini_threes::engine as GameEngine;
use mini_threes::solver::{ParConfig, ParallelSolver, Solver, SolverConfig};
use std::hint::black_box;

fn small_bag() -> SolverConfig {
    // Two-tile refill keeps one full solve well under a second
    SolverConfig { bag: BagConfig { refill: [0, 1, 1] }, ..Default::default() }
}

fn bench_seq_initialize(c: &mut Criterion) {
    GameEngine::new();
    let mut group = c.benchmark_group("seeding");
    group.sample_size(10);
    group.bench_function("seq/refill_011", |bch| {
        bch.iter(|| {
            let mut solver = Solver::with_config(small_bag());
            let tables = solver.initialize();
            black_box(tables.before_len() + tables.after_len())
        })
    });
    group.bench_function("par4/refill_011", |bch| {
        bch.iter(|| {
            let cfg = SolverConfig { par: ParConfig { threads: Some(4), ..Default::default() }, ..small_bag() };
            let solver = ParallelSolver::with_config(cfg);
            solver.initialize().unwrap();
            black_box(solver.last_stats().nodes)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_seq_initialize);
criterion_main!(benches);
