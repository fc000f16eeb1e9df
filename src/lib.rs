//! mini-threes: an exact solver for Threes on a 2x3 board
//!
//! This crate provides:
//! - A compact `Board` type with Threes slide and placement rules (`engine`)
//! - The tile bag and its refill policy (`bag`)
//! - Solver states, their mixed-radix keys and a line notation (`state`, `key`)
//! - A retrograde solver with sequential and parallel variants (`solver`)
//! - A checksummed on-disk format for solved tables (`serialization`)
//! - One game played from the tables against a random bag (`play`)
//!
//! Quick start:
//! ```
//! use mini_threes::bag::{Bag, BagConfig};
//! use mini_threes::engine::{self as GameEngine, Board, Move};
//! use mini_threes::solver::Solver;
//! use mini_threes::state::State;
//!
//! // One-time table init
//! GameEngine::new();
//!
//! // A frozen board is worth exactly its score
//! let frozen = Board::from_cells([4, 5, 4, 5, 4, 5]);
//! assert!(frozen.slide(Move::Left).is_none());
//! let answer = Solver::new().before(&State::new(frozen, 1, Bag::full(&BagConfig::default())));
//! assert_eq!(answer.avg, frozen.score() as f64);
//! ```
pub mod bag;
pub mod engine;
pub mod key;
pub mod play;
pub mod serialization;
pub mod solver;
pub mod state;
