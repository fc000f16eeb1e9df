use criterion::{criterion_group, criterion_main, Criterion};
use mini_threes::engine::{self as GameEngine, Move};
use mini_threes::key::{decode, encode};
use mini_threes::solver::{Solver, Tables};
use mini_threes::state::{State, StateKind};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

fn solved() -> Tables {
    GameEngine::new();
    let mut solver = Solver::new();
    solver.initialize();
    solver.into_tables()
}

/// Before-states sampled from the table, so every lookup hits.
fn corpus(tables: &Tables) -> Vec<State> {
    let mut rng = StdRng::seed_from_u64(7777);
    let entries = tables.before_entries();
    (0..4096).filter_map(|_| decode(entries[rng.gen_range(0..entries.len())].0)).collect()
}

fn bench_lookup(c: &mut Criterion) {
    let tables = solved();
    let states = corpus(&tables);

    c.bench_function("lookup/encode", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for s in &states { acc ^= encode(s); }
            black_box(acc)
        })
    });

    c.bench_function("lookup/solve_before", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for s in &states {
                if let Some(a) = tables.solve(s, StateKind::Before) { acc += a.avg; }
            }
            black_box(acc)
        })
    });

    c.bench_function("lookup/best_move", |bch| {
        bch.iter(|| {
            let mut acc = 0usize;
            for s in &states { acc += tables.best_move(s).map(Move::index).unwrap_or(4); }
            black_box(acc)
        })
    });

    c.bench_function("engine/slide_all", |bch| {
        bch.iter(|| {
            let mut acc = 0u32;
            for s in &states {
                for dir in Move::ALL {
                    if let Some((b, r)) = s.board.slide(dir) { acc = acc.wrapping_add(b.raw() ^ r); }
                }
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
