//! Solver states and their textual notation.
//!
//! A state line reads `<b|a> c0 c1 c2 c3 c4 c5 +<hint|x> [@<dir>] [bag=n1,n2,n3]`,
//! where `c*` are cell ranks, `+x` means no pending tile, `@dir` is the slide
//! that produced an after-state and `bag=` lists the undrawn 1s, 2s and 3s.
//! A line without `bag=` leaves the bag unknown; see [`StateLine`].

use std::fmt;
use std::str::FromStr;

use crate::bag::Bag;
use crate::engine::{Board, Move, ParseMoveError, Rank, CELLS, MAX_RANK};

/// Which side of a move a state sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// The player chooses a slide.
    Before,
    /// The environment places the pending tile.
    After,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateKind::Before => "b",
            StateKind::After => "a",
        })
    }
}

impl FromStr for StateKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.chars().next() {
            Some('b') => Ok(StateKind::Before),
            Some('a') => Ok(StateKind::After),
            _ => Err(ParseError::Kind(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown state type '{0}' (expected 'b' or 'a')")]
    Kind(String),
    #[error("expected 6 cell ranks, found {0}")]
    CellCount(usize),
    #[error("invalid rank '{0}'")]
    Rank(String),
    #[error("invalid hint '{0}' (expected +1, +2, +3 or +x)")]
    Hint(String),
    #[error("invalid bag '{0}' (expected bag=n1,n2,n3)")]
    Bag(String),
    #[error(transparent)]
    Move(#[from] ParseMoveError),
    #[error("unexpected token '{0}'")]
    Token(String),
}

/// A solver state: board, the slide that produced it (after-states only),
/// the pending tile and the undrawn bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State {
    pub board: Board,
    pub last_op: Option<Move>,
    pub hint: Rank,
    pub bag: Bag,
}

impl State {
    pub fn new(board: Board, hint: Rank, bag: Bag) -> Self {
        Self { board, last_op: None, hint, bag }
    }

    #[inline]
    pub fn with_last_op(self, op: Move) -> Self { Self { last_op: Some(op), ..self } }

    /// The same state with the move history dropped, as before-states are
    /// keyed.
    #[inline]
    pub fn normalized(self) -> Self { Self { last_op: None, ..self } }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in self.board.cells() {
            write!(f, "{} ", r)?;
        }
        match self.hint {
            0 => write!(f, "+x")?,
            h => write!(f, "+{}", h)?,
        }
        if let Some(op) = self.last_op {
            write!(f, " @{}", op)?;
        }
        let [ones, twos, threes] = self.bag.counts();
        write!(f, " bag={},{},{}", ones, twos, threes)
    }
}

/// A parsed state line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLine {
    pub kind: StateKind,
    /// The state; its bag is empty when the line gave none.
    pub state: State,
    /// Whether the line carried `bag=`.
    pub bag_given: bool,
}

/// Parse a state line.
///
/// ```
/// use mini_threes::engine::Move;
/// use mini_threes::state::{parse_state_line, StateKind};
/// let line = parse_state_line("a 1 0 0 3 0 0 +2 @left").unwrap();
/// assert_eq!(line.kind, StateKind::After);
/// assert_eq!(line.state.hint, 2);
/// assert_eq!(line.state.last_op, Some(Move::Left));
/// assert!(!line.bag_given);
/// ```
pub fn parse_state_line(line: &str) -> Result<StateLine, ParseError> {
    let mut tokens = line.split_whitespace();
    let kind: StateKind = tokens.next().unwrap_or("").parse()?;

    let mut cells = [0 as Rank; CELLS];
    let mut n = 0;
    let mut hint = None;
    let mut last_op = None;
    let mut bag = None;
    for tok in tokens {
        if let Some(h) = tok.strip_prefix('+') {
            hint = Some(parse_hint(h)?);
        } else if let Some(op) = tok.strip_prefix('@') {
            last_op = Some(op.parse::<Move>()?);
        } else if let Some(b) = tok.strip_prefix("bag=") {
            bag = Some(parse_bag(b)?);
        } else if hint.is_none() {
            if n >= CELLS {
                return Err(ParseError::CellCount(n + 1));
            }
            cells[n] = match tok.parse::<Rank>() {
                Ok(r) if r <= MAX_RANK => r,
                _ => return Err(ParseError::Rank(tok.to_string())),
            };
            n += 1;
        } else {
            return Err(ParseError::Token(tok.to_string()));
        }
    }
    if n != CELLS {
        return Err(ParseError::CellCount(n));
    }
    let state = State {
        board: Board::from_cells(cells),
        last_op,
        hint: hint.unwrap_or(0),
        bag: bag.unwrap_or_default(),
    };
    Ok(StateLine { kind, state, bag_given: bag.is_some() })
}

fn parse_hint(s: &str) -> Result<Rank, ParseError> {
    match s {
        "x" => Ok(0),
        "1" => Ok(1),
        "2" => Ok(2),
        "3" => Ok(3),
        _ => Err(ParseError::Hint(s.to_string())),
    }
}

fn parse_bag(s: &str) -> Result<Bag, ParseError> {
    let counts: Vec<u8> = s
        .split(',')
        .map(|c| c.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| ParseError::Bag(s.to_string()))?;
    match counts.as_slice() {
        &[a, b, c] => Ok(Bag::from_counts([a, b, c])),
        _ => Err(ParseError::Bag(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bagless_line_leaves_bag_unknown() {
        let line = parse_state_line("b 0 1 2 3 4 5 +x").unwrap();
        assert_eq!(line.kind, StateKind::Before);
        assert_eq!(line.state.board.cells(), [0, 1, 2, 3, 4, 5]);
        assert_eq!(line.state.hint, 0);
        assert_eq!(line.state.last_op, None);
        assert!(!line.bag_given);
        assert!(line.state.bag.is_empty());

        let line = parse_state_line("b 1 0 0 0 0 0 +2 bag=0,1,1").unwrap();
        assert!(line.bag_given);
        assert_eq!(line.state.bag, Bag::from_counts([0, 1, 1]));
    }

    #[test]
    fn display_parses_back() {
        let s = State::new(Board::from_cells([3, 0, 1, 0, 2, 6]), 1, Bag::from_counts([1, 0, 1]))
            .with_last_op(Move::Right);
        let line = parse_state_line(&format!("a {}", s)).unwrap();
        assert_eq!(line.state, s);
        assert!(line.bag_given);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_state_line("i 0 0 0 0 0 0 +x").unwrap_err(), ParseError::Kind("i".into()));
        assert_eq!(parse_state_line("b 0 0 0 +x").unwrap_err(), ParseError::CellCount(3));
        assert_eq!(parse_state_line("b 0 0 0 0 0 0 0 +x").unwrap_err(), ParseError::CellCount(7));
        assert_eq!(parse_state_line("b 0 0 0 0 0 99 +x").unwrap_err(), ParseError::Rank("99".into()));
        assert_eq!(parse_state_line("b 0 0 0 0 0 0 +7").unwrap_err(), ParseError::Hint("7".into()));
        assert_eq!(parse_state_line("a 0 0 0 0 0 0 +1 bag=1,2").unwrap_err(), ParseError::Bag("1,2".into()));
        assert!(matches!(parse_state_line("a 0 0 0 0 0 0 +1 @north"), Err(ParseError::Move(_))));
        assert_eq!(parse_state_line("b 0 0 0 0 0 0 +1 9").unwrap_err(), ParseError::Token("9".into()));
    }

    #[test]
    fn normalized_drops_history() {
        let s = State::new(Board::EMPTY, 2, Bag::default()).with_last_op(Move::Down);
        assert_eq!(s.normalized().last_op, None);
        assert_eq!(s.normalized().hint, 2);
    }
}
