use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A direction to slide tiles.
///
/// Declaration order is the canonical enumeration order (`Up, Right, Down,
/// Left`); the solver breaks ties between equally good moves by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Move {
    Up,
    Right,
    Down,
    Left,
}

impl Move {
    /// All directions in canonical order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Right, Move::Down, Move::Left];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Move::Up => 0,
            Move::Right => 1,
            Move::Down => 2,
            Move::Left => 3,
        }
    }

    #[inline]
    pub fn from_index(idx: usize) -> Option<Move> { Move::ALL.get(idx).copied() }

    /// Cells that may receive the next tile after sliding in this direction:
    /// the edge the tiles were pushed away from.
    ///
    /// ```
    /// use mini_threes::engine::Move;
    /// assert_eq!(Move::Up.entry_cells(), &[3, 4, 5]);
    /// assert_eq!(Move::Left.entry_cells(), &[2, 5]);
    /// ```
    #[inline]
    pub fn entry_cells(self) -> &'static [usize] {
        match self {
            Move::Up => &[3, 4, 5],
            Move::Right => &[0, 3],
            Move::Down => &[0, 1, 2],
            Move::Left => &[2, 5],
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Move::Up => "up",
            Move::Right => "right",
            Move::Down => "down",
            Move::Left => "left",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown move '{0}'")]
pub struct ParseMoveError(pub String);

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "u" | "0" => Ok(Move::Up),
            "right" | "r" | "1" => Ok(Move::Right),
            "down" | "d" | "2" => Ok(Move::Down),
            "left" | "l" | "3" => Ok(Move::Left),
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

/// Compact tile rank: 0 is empty, 1 and 2 are the base tiles, 3 and above
/// are threes (3, 6, 12, ...).
pub type Rank = u8;
pub type Reward = u32;
pub type Score = u32;

/// Number of distinct rank symbols, empty included.
pub const TILE_KINDS: u8 = 15;
/// Highest rank a cell can hold; two tiles of this rank do not merge.
pub const MAX_RANK: Rank = TILE_KINDS - 1;
pub const CELLS: usize = 6;
pub const ROWS: usize = 2;
pub const COLS: usize = 3;

const ROW_TABLE_SIZE: usize = 1 << (4 * COLS); // 4,096 possible 12-bit rows
const COL_TABLE_SIZE: usize = 1 << (4 * ROWS); // 256 possible 8-bit columns

type BoardRaw = u32;
type Line = u16;

struct LineTable {
    shifted: Box<[Line]>,
    reward: Box<[Reward]>,
}

struct Stores {
    row_left: LineTable,
    row_right: LineTable,
    col_up: LineTable,
    col_down: LineTable,
    row_score: Box<[Score]>,
}

/// Packed 2x3 Threes board: six 4-bit ranks in the low 24 bits of a `u32`,
/// cell 0 in the highest nibble.
///
/// Cells are indexed row-major:
/// ```text
/// 0 1 2
/// 3 4 5
/// ```
/// All operations return new boards; nothing mutates in place.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board.
    pub const EMPTY: Board = Board(0);

    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw & 0x00ff_ffff) }

    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from row-major ranks. Ranks above `MAX_RANK` are clamped.
    ///
    /// ```
    /// use mini_threes::engine::Board;
    /// let b = Board::from_cells([1, 2, 0, 0, 3, 4]);
    /// assert_eq!(b.get(4), 3);
    /// assert_eq!(b.cells(), [1, 2, 0, 0, 3, 4]);
    /// ```
    pub fn from_cells(cells: [Rank; CELLS]) -> Self {
        cells
            .iter()
            .enumerate()
            .fold(Board::EMPTY, |b, (idx, &rank)| b.with(idx, rank.min(MAX_RANK)))
    }

    #[inline]
    pub fn get(self, idx: usize) -> Rank {
        debug_assert!(idx < CELLS);
        ((self.0 >> cell_shift(idx)) & 0xf) as Rank
    }

    /// Return a copy of this board with cell `idx` set to `rank`.
    #[inline]
    pub fn with(self, idx: usize, rank: Rank) -> Self {
        debug_assert!(idx < CELLS && rank <= 0xf);
        let shift = cell_shift(idx);
        Board((self.0 & !(0xf << shift)) | ((rank as BoardRaw & 0xf) << shift))
    }

    pub fn cells(self) -> [Rank; CELLS] {
        let mut out = [0; CELLS];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = self.get(idx);
        }
        out
    }

    /// Return the board resulting from sliding in `dir`. An illegal slide
    /// returns the board unchanged.
    #[inline]
    pub fn shift(self, dir: Move) -> Self { shift_with_reward(self, dir).0 }

    /// Slide in `dir`, returning the new board and the merge reward, or
    /// `None` when the slide leaves the board unchanged.
    ///
    /// A merge of two rank-`r` threes credits `score_value(r)` and a 1+2 merge
    /// credits 3, so the reward is exactly the gain in [`Board::score`].
    ///
    /// ```
    /// use mini_threes::engine::{self as GameEngine, Board, Move};
    /// GameEngine::new();
    /// let b = Board::from_cells([1, 2, 0, 0, 0, 0]);
    /// let (left, reward) = b.slide(Move::Left).unwrap();
    /// assert_eq!(left.cells(), [3, 0, 0, 0, 0, 0]);
    /// assert_eq!(reward, 3);
    /// assert!(left.slide(Move::Left).is_none());
    /// ```
    #[inline]
    pub fn slide(self, dir: Move) -> Option<(Board, Reward)> {
        let (moved, reward) = shift_with_reward(self, dir);
        if moved != self { Some((moved, reward)) } else { None }
    }

    /// Place a base tile on an empty cell.
    ///
    /// Returns `None` when `pos` is off the board, `rank` is not a base tile
    /// (1, 2 or 3) or the cell is occupied.
    pub fn place(self, pos: usize, rank: Rank) -> Option<(Board, Reward)> {
        if pos >= CELLS || !(1..=3).contains(&rank) || self.get(pos) != 0 {
            return None;
        }
        Some((self.with(pos, rank), score_value(rank)))
    }

    /// Static score: sum of the per-cell score values.
    ///
    /// ```
    /// use mini_threes::engine::{self as GameEngine, Board};
    /// GameEngine::new();
    /// assert_eq!(Board::from_cells([1, 2, 3, 4, 5, 0]).score(), 3 + 9 + 27);
    /// ```
    #[inline]
    pub fn score(self) -> Score { get_score(self) }

    /// True if no slide changes the board.
    #[inline]
    pub fn is_game_over(self) -> bool { is_game_over(self) }

    #[inline]
    pub fn count_empty(self) -> usize { (0..CELLS).filter(|&idx| self.get(idx) == 0).count() }

    #[inline]
    pub fn highest_rank(self) -> Rank { (0..CELLS).map(|idx| self.get(idx)).max().unwrap_or(0) }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#08x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let board: Vec<_> = self.cells().iter().map(|&r| format_val(r)).collect();
        write!(
            f,
            "\n{}|{}|{}\n-----------------------\n{}|{}|{}\n",
            board[0], board[1], board[2],
            board[3], board[4], board[5]
        )
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

/// Face value shown on a tile: 1, 2, then `3 * 2^(rank - 3)`.
#[inline]
pub fn face_value(rank: Rank) -> u32 {
    match rank {
        0..=2 => rank as u32,
        r => 3 << (r - 3),
    }
}

/// Score contributed by a single tile: 0 for base tiles 1 and 2, then
/// `3^(rank - 2)`.
#[inline]
pub fn score_value(rank: Rank) -> Score {
    if rank < 3 { 0 } else { 3u32.pow((rank - 2) as u32) }
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    STORES.get_or_init(create_stores);
}

pub fn get_score(board: Board) -> Score {
    let s = stores();
    (0..ROWS).fold(0, |acc, r| acc + s.row_score[extract_row(board.0, r) as usize])
}

pub fn shift(board: Board, direction: Move) -> Board { board.shift(direction) }

pub fn is_game_over(board: Board) -> bool {
    Move::ALL.iter().all(|&dir| board.shift(dir) == board)
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

#[inline(always)]
fn cell_shift(idx: usize) -> u32 { ((CELLS - 1 - idx) * 4) as u32 }

#[inline(always)]
fn extract_row(board: BoardRaw, row: usize) -> Line {
    ((board >> ((ROWS - 1 - row) * 12)) & 0xfff) as Line
}

fn shift_with_reward(board: Board, dir: Move) -> (Board, Reward) {
    let s = stores();
    match dir {
        Move::Left | Move::Right => {
            let table = if dir == Move::Left { &s.row_left } else { &s.row_right };
            (0..ROWS).fold((Board::EMPTY, 0), |(acc, reward), r| {
                let row = extract_row(board.0, r) as usize;
                let new_row = table.shifted[row] as BoardRaw;
                (Board(acc.0 | (new_row << ((ROWS - 1 - r) * 12))), reward + table.reward[row])
            })
        }
        Move::Up | Move::Down => {
            let table = if dir == Move::Up { &s.col_up } else { &s.col_down };
            (0..COLS).fold((board, 0), |(acc, reward), c| {
                let col = ((board.get(c) as usize) << 4) | board.get(c + COLS) as usize;
                let new_col = table.shifted[col];
                let next = acc.with(c, (new_col >> 4) as Rank).with(c + COLS, (new_col & 0xf) as Rank);
                (next, reward + table.reward[col])
            })
        }
    }
}

fn create_stores() -> Stores {
    let mut row_score = vec![0 as Score; ROW_TABLE_SIZE];
    for (line, slot) in row_score.iter_mut().enumerate() {
        *slot = line_to_vec(line as Line, COLS).into_iter().map(score_value).sum();
    }
    Stores {
        row_left: build_line_table(COLS, false),
        row_right: build_line_table(COLS, true),
        col_up: build_line_table(ROWS, false),
        col_down: build_line_table(ROWS, true),
        row_score: row_score.into_boxed_slice(),
    }
}

fn build_line_table(len: usize, reversed: bool) -> LineTable {
    let size = if len == COLS { ROW_TABLE_SIZE } else { COL_TABLE_SIZE };
    let mut shifted = vec![0 as Line; size];
    let mut reward = vec![0 as Reward; size];
    for line in 0..size {
        let mut tiles = line_to_vec(line as Line, len);
        if reversed { tiles.reverse(); }
        let r = slide_line(&mut tiles);
        if reversed { tiles.reverse(); }
        shifted[line] = vec_to_line(&tiles);
        reward[line] = r;
    }
    LineTable { shifted: shifted.into_boxed_slice(), reward: reward.into_boxed_slice() }
}

fn line_to_vec(line: Line, len: usize) -> Vec<Rank> {
    (0..len).map(|idx| ((line >> ((len - 1 - idx) * 4)) & 0xf) as Rank).collect()
}

fn vec_to_line(tiles: &[Rank]) -> Line {
    tiles.iter().fold(0, |acc, &t| (acc << 4) | t as Line)
}

/// Slide one line toward index 0 by at most one cell per tile, Threes style.
fn slide_line(line: &mut [Rank]) -> Reward {
    let mut reward = 0;
    for c in 1..line.len() {
        let (prev, cur) = (line[c - 1], line[c]);
        if prev == 0 {
            line[c - 1] = cur;
            line[c] = 0;
        } else if (prev == 1 || prev == 2) && prev + cur == 3 {
            line[c - 1] = 3;
            line[c] = 0;
            reward += score_value(3);
        } else if prev >= 3 && prev == cur && prev < MAX_RANK {
            line[c - 1] = prev + 1;
            line[c] = 0;
            reward += score_value(prev);
        }
    }
    reward
}

fn format_val(rank: Rank) -> String {
    match rank {
        0 => String::from("       "),
        r => format!("{:^7}", face_value(r)),
    }
}
