use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use ahash::RandomState as AHasher;
use dashmap::DashMap;
use log::info;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::engine::{self, Move};
use crate::key::{encode, StateKey};
use crate::state::{State, StateKind};

use super::{
    bag_after_placing, entry_cells, seeds, Answer, Expectation, SearchStats, Seed, SolverConfig, SolverError,
    Tables,
};

type Table = DashMap<StateKey, Answer, AHasher>;

/// Parallel retrograde solver: seeds are solved concurrently on a rayon pool
/// against shared `DashMap` tables.
///
/// There is no in-progress marker. Two workers reaching the same unsolved
/// state both evaluate it; every evaluation is a pure function of the state,
/// so the duplicate inserts carry identical answers.
pub struct ParallelSolver {
    cfg: SolverConfig,
    before: Table,
    after: Table,
    nodes: AtomicU64,
    max_depth: AtomicUsize,
}

impl ParallelSolver {
    pub fn new() -> Self { Self::with_config(SolverConfig::default()) }

    pub fn with_config(cfg: SolverConfig) -> Self {
        engine::new();
        Self {
            cfg,
            before: DashMap::with_hasher(AHasher::new()),
            after: DashMap::with_hasher(AHasher::new()),
            nodes: AtomicU64::new(0),
            max_depth: AtomicUsize::new(0),
        }
    }

    pub fn try_with_config(cfg: SolverConfig) -> Result<Self, SolverError> {
        cfg.validate()?;
        Ok(Self::with_config(cfg))
    }

    #[inline]
    pub fn config(&self) -> &SolverConfig { &self.cfg }

    /// Solve every starting configuration on a dedicated pool.
    pub fn initialize(&self) -> Result<(), SolverError> { self.initialize_with(|_| {}) }

    /// Like [`Self::initialize`], calling `on_seed` as each seed finishes.
    pub fn initialize_with<F>(&self, on_seed: F) -> Result<(), SolverError>
    where
        F: Fn(&Seed) + Sync,
    {
        let start = Instant::now();
        let mut builder = ThreadPoolBuilder::new().stack_size(self.cfg.par.stack_size);
        if let Some(n) = self.cfg.par.threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        let all = seeds(&self.cfg.bag);
        pool.install(|| {
            all.par_iter().for_each(|seed| {
                self.goto_before_state(seed.state.normalized(), 0);
                on_seed(seed);
            })
        });
        info!(
            "parallel initialization completed on {} threads: {} before-states, {} after-states in {:.2?}",
            pool.current_num_threads(),
            self.before.len(),
            self.after.len(),
            start.elapsed()
        );
        Ok(())
    }

    /// Evaluate a before-state on the calling thread, memoizing into the
    /// shared tables.
    pub fn before(&self, state: &State) -> Answer { self.goto_before_state(state.normalized(), 0) }

    /// Evaluate an after-state on the calling thread.
    pub fn after(&self, state: &State) -> Answer { self.goto_after_state(*state, 0) }

    /// Table lookup only; never computes.
    pub fn solve(&self, state: &State, kind: StateKind) -> Option<Answer> {
        match kind {
            StateKind::Before => self.before.get(&encode(&state.normalized())).map(|a| *a),
            StateKind::After => {
                state.last_op?;
                self.after.get(&encode(state)).map(|a| *a)
            }
        }
    }

    pub fn last_stats(&self) -> SearchStats {
        SearchStats { nodes: self.nodes.load(Ordering::Relaxed), max_depth: self.max_depth.load(Ordering::Relaxed) }
    }

    /// Move the shared tables into plain [`Tables`].
    pub fn into_tables(self) -> Tables {
        Tables::from_entries(self.before.into_iter(), self.after.into_iter())
    }

    fn goto_before_state(&self, before: State, depth: usize) -> Answer {
        self.visit(depth);
        let key = encode(&before);
        if let Some(hit) = self.before.get(&key) {
            return *hit;
        }
        let answer = Move::ALL
            .iter()
            .filter_map(|&dir| before.board.slide(dir).map(|(moved, _)| (dir, moved)))
            .map(|(dir, moved)| self.goto_after_state(State { board: moved, ..before }.with_last_op(dir), depth + 1))
            .fold(None, |best: Option<Answer>, value| match best {
                Some(b) if value.avg <= b.avg => Some(b),
                _ => Some(value),
            })
            .unwrap_or_else(|| Answer::terminal(before.board.score() as f64));
        self.before.insert(key, answer);
        answer
    }

    fn goto_after_state(&self, after: State, depth: usize) -> Answer {
        self.visit(depth);
        let key = encode(&after);
        if let Some(hit) = self.after.get(&key) {
            return *hit;
        }
        let (_, cells) = entry_cells(&after);
        let bag = bag_after_placing(&after, &self.cfg.bag);
        let cell_prob = 1.0 / cells.len() as f64;
        let mut acc = Expectation::default();
        for &pos in &cells {
            let Some((placed, _)) = after.board.place(pos, after.hint) else {
                panic!("cannot place tile {} at {pos} in [{after}]", after.hint)
            };
            for (next, p) in bag.draws() {
                acc.push(cell_prob * p, self.goto_before_state(State::new(placed, next, bag), depth + 1));
            }
        }
        let answer = acc.finish();
        self.after.insert(key, answer);
        answer
    }

    #[inline]
    fn visit(&self, depth: usize) {
        self.nodes.fetch_add(1, Ordering::Relaxed);
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }
}

impl Default for ParallelSolver { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::{Bag, BagConfig};
    use crate::engine::Board;
    use crate::solver::{ParConfig, Solver};

    #[test]
    fn matches_sequential_tables() {
        let cfg = SolverConfig { par: ParConfig { threads: Some(4), ..Default::default() }, ..Default::default() };
        let par = ParallelSolver::with_config(cfg.clone());
        par.initialize().unwrap();
        let mut seq = Solver::with_config(cfg);
        seq.initialize();
        assert_eq!(par.into_tables(), *seq.tables());
    }

    #[test]
    fn progress_sees_every_seed() {
        let par = ParallelSolver::with_config(SolverConfig {
            bag: BagConfig { refill: [0, 1, 1] },
            par: ParConfig { threads: Some(2), ..Default::default() },
        });
        let done = AtomicUsize::new(0);
        par.initialize_with(|_| {
            done.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        assert_eq!(done.load(Ordering::Relaxed), seeds(&par.config().bag).len());
        assert!(par.last_stats().nodes > 0);
    }

    #[test]
    fn solve_is_lookup_only() {
        let par = ParallelSolver::new();
        let s = State::new(Board::from_cells([4, 5, 4, 5, 4, 5]), 2, Bag::full(&BagConfig::default()));
        assert_eq!(par.solve(&s, StateKind::Before), None);
        assert_eq!(par.before(&s), Answer::terminal(108.0));
        assert_eq!(par.solve(&s, StateKind::Before), Some(Answer::terminal(108.0)));
        assert_eq!(par.solve(&s, StateKind::After), None);
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = SolverConfig { bag: BagConfig { refill: [0, 0, 0] }, ..Default::default() };
        assert!(matches!(ParallelSolver::try_with_config(cfg), Err(SolverError::Config(_))));
    }
}
