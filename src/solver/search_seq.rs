use std::time::Instant;

use log::{debug, info};

use crate::engine::{self, Move};
use crate::key::encode;
use crate::state::{State, StateKind};

use super::{
    bag_after_placing, entry_cells, seeds, Answer, Expectation, SearchStats, SolverConfig, SolverError, Tables,
};

/// Single-threaded retrograde solver.
///
/// Owns its before/after tables; separate instances never share state.
pub struct Solver {
    cfg: SolverConfig,
    tables: Tables,
    stats: SearchStats,
}

impl Solver {
    pub fn new() -> Self { Self::with_config(SolverConfig::default()) }

    /// Build a solver without validating `cfg`; see [`Self::try_with_config`].
    pub fn with_config(cfg: SolverConfig) -> Self {
        engine::new();
        Self { cfg, tables: Tables::new(), stats: SearchStats::default() }
    }

    pub fn try_with_config(cfg: SolverConfig) -> Result<Self, SolverError> {
        cfg.validate()?;
        Ok(Self::with_config(cfg))
    }

    #[inline]
    pub fn config(&self) -> &SolverConfig { &self.cfg }

    /// Solve every starting configuration, filling both tables with every
    /// state reachable in play.
    ///
    /// Example
    /// ```no_run
    /// use mini_threes::solver::Solver;
    /// let mut solver = Solver::new();
    /// let tables = solver.initialize();
    /// assert!(tables.before_len() > 0 && tables.after_len() > 0);
    /// ```
    pub fn initialize(&mut self) -> &Tables {
        let start = Instant::now();
        let mut group = None;
        for seed in seeds(&self.cfg.bag) {
            if group != Some((seed.pos, seed.tile)) {
                debug!("initialization for position = {}, tile = {} ...", seed.pos, seed.tile);
                group = Some((seed.pos, seed.tile));
            }
            self.before(&seed.state);
        }
        info!(
            "initialization completed: {} before-states, {} after-states, {} nodes, depth {} in {:.2?}",
            self.tables.before_len(),
            self.tables.after_len(),
            self.stats.nodes,
            self.stats.max_depth,
            start.elapsed()
        );
        &self.tables
    }

    /// Answer for a state where the player picks the next slide.
    ///
    /// The move history of `state` is ignored. The result is computed (and
    /// memoized) on a table miss.
    ///
    /// # Panics
    /// If `state` can still slide but has no pending tile (`hint == 0`), or
    /// announces a pending tile the bag does not hold.
    pub fn before(&mut self, state: &State) -> Answer { self.goto_before_state(state.normalized(), 0) }

    /// Answer for a state where the pending tile is about to be placed after
    /// the slide `state.last_op`.
    ///
    /// # Panics
    /// If `state` has no last move, no empty entry cell, no pending tile, or
    /// a pending tile missing from its bag.
    pub fn after(&mut self, state: &State) -> Answer { self.goto_after_state(*state, 0) }

    /// Table lookup only; never computes. See [`Tables::solve`].
    #[inline]
    pub fn solve(&self, state: &State, kind: StateKind) -> Option<Answer> { self.tables.solve(state, kind) }

    /// Table lookup only; never computes. See [`Tables::best_move`].
    #[inline]
    pub fn best_move(&self, state: &State) -> Option<Move> { self.tables.best_move(state) }

    #[inline]
    pub fn tables(&self) -> &Tables { &self.tables }

    pub fn into_tables(self) -> Tables { self.tables }

    /// Counters accumulated since construction or the last reset.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn goto_before_state(&mut self, before: State, depth: usize) -> Answer {
        self.visit(depth);
        let key = encode(&before);
        if let Some(answer) = self.tables.get_before(key) {
            return answer;
        }
        let mut best: Option<Answer> = None;
        for &dir in &Move::ALL {
            let Some((moved, _)) = before.board.slide(dir) else { continue };
            let after = State { board: moved, ..before }.with_last_op(dir);
            let value = self.goto_after_state(after, depth + 1);
            if best.map_or(true, |b| value.avg > b.avg) {
                best = Some(value);
            }
        }
        let answer = best.unwrap_or_else(|| Answer::terminal(before.board.score() as f64));
        self.tables.before.insert(key, answer);
        answer
    }

    fn goto_after_state(&mut self, after: State, depth: usize) -> Answer {
        self.visit(depth);
        let key = encode(&after);
        if let Some(answer) = self.tables.get_after(key) {
            return answer;
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
                let value = self.goto_before_state(State::new(placed, next, bag), depth + 1);
                acc.push(cell_prob * p, value);
            }
        }
        let answer = acc.finish();
        self.tables.after.insert(key, answer);
        answer
    }

    #[inline]
    fn visit(&mut self, depth: usize) {
        self.stats.nodes += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);
    }
}

impl Default for Solver { fn default() -> Self { Self::new() } }
