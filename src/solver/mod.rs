//! Exact retrograde solver for 2x3 Threes.
//!
//! The game alternates between two kinds of states:
//! - before-states, where the player picks a slide (max node), and
//! - after-states, where the pending tile lands on one of the entry cells and
//!   the next tile is drawn from the bag (chance node).
//!
//! [`Solver::before`] and [`Solver::after`] evaluate them by full-width mutual
//! recursion, memoizing every result in a [`Tables`] pair. Tile ranks only
//! grow and the static score never drops along play, so the state graph is
//! acyclic and the recursion terminates without any depth limit.
//!
//! Two implementations share the same semantics:
//! - [`Solver`]: single-threaded, owns its tables.
//! - [`ParallelSolver`]: seeds solved on a rayon pool against `DashMap` tables.
//!
//! Quick start
//! ```no_run
//! use mini_threes::bag::Bag;
//! use mini_threes::engine::Board;
//! use mini_threes::solver::Solver;
//! use mini_threes::state::{State, StateKind};
//!
//! let mut solver = Solver::new();
//! solver.initialize();
//!
//! let cfg = solver.config().bag;
//! let state = State::new(Board::from_cells([1, 0, 0, 0, 0, 0]), 2, Bag::full(&cfg).take(1, &cfg).unwrap());
//! let answer = solver.solve(&state, StateKind::Before).unwrap();
//! assert!(answer.min <= answer.avg && answer.avg <= answer.max);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bag::{Bag, BagConfig, ConfigError, BASE_RANKS};
use crate::engine::{Board, Move, Rank, CELLS};
use crate::key::{encode, StateKey};
use crate::state::{State, StateKind, StateLine};

mod search_par;
mod search_seq;

pub use search_par::ParallelSolver;
pub use search_seq::Solver;

/// Final-score statistics of a state: the expected score under optimal play
/// and the extremes reachable along that same play.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl Answer {
    /// Answer of a finished game worth `v`.
    #[inline]
    pub fn terminal(v: f64) -> Self { Self { min: v, avg: v, max: v } }

    pub fn approx_eq(&self, other: &Answer, tol: f64) -> bool {
        (self.min - other.min).abs() <= tol
            && (self.avg - other.avg).abs() <= tol
            && (self.max - other.max).abs() <= tol
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.min, self.avg, self.max)
    }
}

/// Solver knobs. Defaults solve the standard game (bag of one 1, one 2 and
/// one 3).
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Bag refill composition.
    pub bag: BagConfig,
    /// Settings used only by the parallel implementation.
    pub par: ParConfig,
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> { self.bag.validate() }
}

/// Thread pool settings for [`ParallelSolver`].
#[derive(Debug, Clone, Copy)]
pub struct ParConfig {
    /// Worker count; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Worker stack size in bytes. The recursion is as deep as the longest game.
    pub stack_size: usize,
}

impl Default for ParConfig {
    fn default() -> Self { Self { threads: None, stack_size: 64 << 20 } }
}

#[derive(thiserror::Error, Debug)]
pub enum SolverError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Counters from the last [`Solver::initialize`] or direct evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Resolver calls, table hits included.
    pub nodes: u64,
    /// Deepest recursion level reached (a before/after pair is two levels).
    pub max_depth: usize,
}

/// One initial configuration: a single tile on an empty board and the first
/// pending tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    pub pos: usize,
    pub tile: Rank,
    pub state: State,
}

/// Every starting configuration: each cell, each base tile the bag holds, and
/// each distinct tile that can be announced next from what remains.
pub fn seeds(cfg: &BagConfig) -> Vec<Seed> {
    let mut out = Vec::new();
    for pos in 0..CELLS {
        for &tile in &BASE_RANKS {
            let Some(bag) = Bag::full(cfg).take(tile, cfg) else { continue };
            let Some((board, _)) = Board::EMPTY.place(pos, tile) else { continue };
            for (hint, _) in bag.draws() {
                out.push(Seed { pos, tile, state: State::new(board, hint, bag) });
            }
        }
    }
    out
}

/// Result of looking up a state line that may omit its bag.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(Answer),
    Miss,
    /// No bag was given and several bags match; every `(bag, answer)` hit.
    Ambiguous(Vec<(Bag, Answer)>),
}

/// The before- and after-state transposition tables.
///
/// Queries are pure lookups; a miss means the state was never reached by
/// the solver that filled the tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub(crate) before: HashMap<StateKey, Answer>,
    pub(crate) after: HashMap<StateKey, Answer>,
}

impl Tables {
    pub fn new() -> Self { Self::default() }

    /// Rebuild tables from `(key, answer)` records.
    pub fn from_entries(
        before: impl IntoIterator<Item = (StateKey, Answer)>,
        after: impl IntoIterator<Item = (StateKey, Answer)>,
    ) -> Self {
        Self { before: before.into_iter().collect(), after: after.into_iter().collect() }
    }

    #[inline]
    pub fn before_len(&self) -> usize { self.before.len() }

    #[inline]
    pub fn after_len(&self) -> usize { self.after.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.before.is_empty() && self.after.is_empty() }

    #[inline]
    pub fn get_before(&self, key: StateKey) -> Option<Answer> { self.before.get(&key).copied() }

    #[inline]
    pub fn get_after(&self, key: StateKey) -> Option<Answer> { self.after.get(&key).copied() }

    /// Before-table records sorted by key.
    pub fn before_entries(&self) -> Vec<(StateKey, Answer)> { sorted(&self.before) }

    /// After-table records sorted by key.
    pub fn after_entries(&self) -> Vec<(StateKey, Answer)> { sorted(&self.after) }

    /// Look up the answer for `state` interpreted as `kind`.
    ///
    /// Before-states are looked up with the move history dropped. After-states
    /// must carry the slide that produced them; without it the query misses.
    pub fn solve(&self, state: &State, kind: StateKind) -> Option<Answer> {
        match kind {
            StateKind::Before => self.get_before(encode(&state.normalized())),
            StateKind::After => {
                state.last_op?;
                self.get_after(encode(state))
            }
        }
    }

    /// Every direction under which `state` is a known after-state.
    ///
    /// A board can be reachable by more than one slide with different answers;
    /// this exposes all of them instead of guessing.
    pub fn after_candidates(&self, state: &State) -> Vec<(Move, Answer)> {
        Move::ALL
            .iter()
            .filter_map(|&op| self.get_after(encode(&state.with_last_op(op))).map(|a| (op, a)))
            .collect()
    }

    /// Every bag under which `state`, read as `kind`, is a known state.
    ///
    /// For callers that know the board and pending tile but not the bag.
    pub fn bag_candidates(&self, state: &State, kind: StateKind, cfg: &BagConfig) -> Vec<(Bag, Answer)> {
        Bag::compositions(cfg)
            .filter_map(|bag| self.solve(&State { bag, ..*state }, kind).map(|a| (bag, a)))
            .collect()
    }

    /// Look up a parsed state line. Without a bag on the line, the state is
    /// tried under every bag `cfg` allows and must match exactly one.
    pub fn lookup(&self, line: &StateLine, cfg: &BagConfig) -> Lookup {
        if line.bag_given {
            return self.solve(&line.state, line.kind).map_or(Lookup::Miss, Lookup::Hit);
        }
        let mut hits = self.bag_candidates(&line.state, line.kind, cfg);
        match hits.len() {
            0 => Lookup::Miss,
            1 => Lookup::Hit(hits.remove(0).1),
            _ => Lookup::Ambiguous(hits),
        }
    }

    /// The slide with the best expected score from a before-state, by table
    /// lookup only. Ties go to the first direction in canonical order.
    pub fn best_move(&self, state: &State) -> Option<Move> {
        let mut best: Option<(Move, f64)> = None;
        for &dir in &Move::ALL {
            let Some((moved, _)) = state.board.slide(dir) else { continue };
            let after = State { board: moved, ..*state }.with_last_op(dir);
            let Some(answer) = self.get_after(encode(&after)) else { continue };
            if best.map_or(true, |(_, avg)| answer.avg > avg) {
                best = Some((dir, answer.avg));
            }
        }
        best.map(|(dir, _)| dir)
    }
}

fn sorted(map: &HashMap<StateKey, Answer>) -> Vec<(StateKey, Answer)> {
    let mut v: Vec<_> = map.iter().map(|(&k, &a)| (k, a)).collect();
    v.sort_unstable_by_key(|&(k, _)| k);
    v
}

/// Running probability-weighted statistics over the outcomes of a chance
/// node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Expectation {
    min: f64,
    avg: f64,
    max: f64,
    weight: f64,
}

impl Default for Expectation {
    fn default() -> Self { Self { min: f64::INFINITY, avg: 0.0, max: f64::NEG_INFINITY, weight: 0.0 } }
}

impl Expectation {
    #[inline]
    pub(crate) fn push(&mut self, p: f64, child: Answer) {
        self.avg += p * child.avg;
        self.min = self.min.min(child.min);
        self.max = self.max.max(child.max);
        self.weight += p;
    }

    #[inline]
    pub(crate) fn finish(self) -> Answer {
        debug_assert!((self.weight - 1.0).abs() < 1e-9, "branch probabilities sum to {}", self.weight);
        Answer { min: self.min, avg: self.avg, max: self.max }
    }
}

/// Empty entry cells of an after-state, with the slide that produced it.
///
/// # Panics
/// If the state has no last move or no empty entry cell. Neither can happen
/// for a state produced by a legal slide.
pub(crate) fn entry_cells(state: &State) -> (Move, Vec<usize>) {
    let op = state.last_op.expect("after-state without the slide that produced it");
    let cells: Vec<usize> = op.entry_cells().iter().copied().filter(|&c| state.board.get(c) == 0).collect();
    assert!(!cells.is_empty(), "after-state [{state}] has no empty entry cell");
    (op, cells)
}

/// Bag left once the pending tile is placed, refilled if that emptied it.
///
/// # Panics
/// If there is no pending tile (`hint == 0`) or it is not in the bag.
pub(crate) fn bag_after_placing(state: &State, cfg: &BagConfig) -> Bag {
    assert!(state.hint != 0, "state [{state}] has no pending tile to place");
    match state.bag.take(state.hint, cfg) {
        Some(bag) => bag,
        None => panic!("pending tile {} missing from bag in [{state}]", state.hint),
    }
}
