//! Mixed-radix state keys.
//!
//! Every field of a [`State`] is a digit below [`TILE_KINDS`]; the key is the
//! positional number those digits spell in base `TILE_KINDS`:
//!
//! | digit | weight  | field                                   |
//! |-------|---------|-----------------------------------------|
//! | 0..6  | R^0..R^5 | cell ranks                             |
//! | 6     | R^6     | last move (`Up..Left` = 0..3, none = 4) |
//! | 7     | R^7     | pending tile                            |
//! | 8..11 | R^8..R^10 | undrawn 1s, 2s, 3s                    |
//!
//! `R^11` is below `2^43`, so keys fit a `u64` with room to spare, and
//! [`decode`] inverts [`encode`] exactly.

use crate::bag::Bag;
use crate::engine::{Board, Move, Rank, CELLS, TILE_KINDS};
use crate::state::State;

pub type StateKey = u64;

const RADIX: u64 = TILE_KINDS as u64;
const NO_MOVE: u64 = 4;
const DIGITS: usize = CELLS + 5;

const fn weights() -> [u64; DIGITS] {
    let mut w = [1u64; DIGITS];
    let mut i = 1;
    while i < DIGITS {
        w[i] = w[i - 1] * RADIX;
        i += 1;
    }
    w
}

const COEF: [u64; DIGITS] = weights();

/// Encode a state. Deterministic and collision-free for digits below the
/// radix, which the board and a validated bag config guarantee.
///
/// ```
/// use mini_threes::bag::Bag;
/// use mini_threes::engine::{Board, Move};
/// use mini_threes::key::{decode, encode};
/// use mini_threes::state::State;
/// let s = State::new(Board::from_cells([1, 0, 3, 0, 0, 2]), 2, Bag::from_counts([1, 1, 0]))
///     .with_last_op(Move::Down);
/// assert_eq!(decode(encode(&s)), Some(s));
/// ```
#[inline]
pub fn encode(state: &State) -> StateKey {
    debug_assert!(state.hint < TILE_KINDS);
    let mut key = 0;
    for (i, &rank) in state.board.cells().iter().enumerate() {
        key += rank as u64 * COEF[i];
    }
    key += state.last_op.map_or(NO_MOVE, |op| op.index() as u64) * COEF[CELLS];
    key += state.hint as u64 * COEF[CELLS + 1];
    for (i, &count) in state.bag.counts().iter().enumerate() {
        debug_assert!(count < TILE_KINDS);
        key += count as u64 * COEF[CELLS + 2 + i];
    }
    key
}

/// Recover the state a key was made from, or `None` if the key could not
/// have come from [`encode`].
pub fn decode(key: StateKey) -> Option<State> {
    if key >= COEF[DIGITS - 1] * RADIX {
        return None;
    }
    let digit = |i: usize| ((key / COEF[i]) % RADIX) as Rank;
    let mut cells = [0; CELLS];
    for (i, slot) in cells.iter_mut().enumerate() {
        *slot = digit(i);
    }
    let last_op = match digit(CELLS) as u64 {
        NO_MOVE => None,
        op => Some(Move::from_index(op as usize)?),
    };
    Some(State {
        board: Board::from_cells(cells),
        last_op,
        hint: digit(CELLS + 1),
        bag: Bag::from_counts([digit(CELLS + 2), digit(CELLS + 3), digit(CELLS + 4)]),
    })
}
