//! Playing one game against a random bag with solved tables.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::bag::{Bag, BagConfig};
use crate::engine::{Board, Move, CELLS};
use crate::solver::{Answer, Tables};
use crate::state::{State, StateKind};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    #[error("bag refill composition holds no tiles")]
    EmptyBag,
}

/// A finished game.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    /// Opening before-state: one tile on the board and the first pending tile.
    pub start: State,
    /// Table answer for `start`, if the tables hold it.
    pub start_answer: Option<Answer>,
    /// Each slide with the board after the new tile landed.
    pub steps: Vec<(Move, Board)>,
    pub final_board: Board,
}

impl Game {
    #[inline]
    pub fn final_score(&self) -> u32 { self.final_board.score() }
}

/// Play a game: the environment draws tiles from the bag and picks entry
/// cells at random, the player follows [`Tables::best_move`] until it has no
/// answer.
pub fn play<R: Rng + ?Sized>(tables: &Tables, cfg: &BagConfig, rng: &mut R) -> Result<Game, PlayError> {
    let full = Bag::full(cfg);
    let first = full.draw(rng).ok_or(PlayError::EmptyBag)?;
    let mut bag = full.take(first, cfg).ok_or(PlayError::EmptyBag)?;
    let mut board = Board::EMPTY.with(rng.gen_range(0..CELLS), first);
    let mut hint = bag.draw(rng).ok_or(PlayError::EmptyBag)?;

    let start = State::new(board, hint, bag);
    let start_answer = tables.solve(&start, StateKind::Before);
    let mut steps = Vec::new();
    while let Some(dir) = tables.best_move(&State::new(board, hint, bag)) {
        let Some((moved, _)) = board.slide(dir) else { break };
        let open: Vec<usize> = dir.entry_cells().iter().copied().filter(|&c| moved.get(c) == 0).collect();
        let Some(&pos) = open.choose(rng) else {
            panic!("slide {dir} left no entry cell open on {moved:?}")
        };
        board = moved.with(pos, hint);
        bag = match bag.take(hint, cfg) {
            Some(bag) => bag,
            None => panic!("pending tile {hint} missing from bag {:?}", bag.counts()),
        };
        hint = bag.draw(rng).ok_or(PlayError::EmptyBag)?;
        steps.push((dir, board));
    }
    Ok(Game { start, start_answer, steps, final_board: board })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Solver, SolverConfig};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn final_score_lies_within_start_answer() {
        let cfg = SolverConfig { bag: BagConfig { refill: [0, 1, 1] }, ..Default::default() };
        let mut solver = Solver::with_config(cfg.clone());
        solver.initialize();
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..20 {
            let game = play(solver.tables(), &cfg.bag, &mut rng).unwrap();
            let answer = game.start_answer.expect("every opening is solved");
            let score = game.final_score() as f64;
            assert!(answer.min <= score && score <= answer.max, "{score} outside {answer}");
            assert!(game.final_board.is_game_over());
            assert!(!game.steps.is_empty());
        }
    }

    #[test]
    fn empty_tables_end_at_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let game = play(&Tables::new(), &BagConfig::default(), &mut rng).unwrap();
        assert_eq!(game.start_answer, None);
        assert!(game.steps.is_empty());
        assert_eq!(game.final_board, game.start.board);
    }
}
