use crate::game::piece::Piece;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// the eight scan directions (row, col)
const DIRECTIONS: [(isize, isize); 8] = [
    (-1, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardError {
    /// board construction with a size that is not an even number >= 6
    InvalidBoardSize(usize),
    /// a placement the valid-move cache does not recognize; during a
    /// live game this means the local board diverged from the server
    IllegalMove { color: Piece, row: usize, col: usize },
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardError::InvalidBoardSize(size) => {
                write!(f, "board size must be an even number >= 6, got {}", size)
            }
            BoardError::IllegalMove { color, row, col } => {
                write!(f, "illegal move: {} at ({}, {})", color, row, col)
            }
        }
    }
}

impl std::error::Error for BoardError {}

/// An N x N Othello board with cached legal moves for both colors.
///
/// The caches map a candidate cell index (`row * size + col`) to the
/// full list of cells that change when that move is played, the placed
/// cell first. They are recomputed from scratch after every placement,
/// so a key is present if and only if the move is legal right now.
#[derive(Clone, Debug, PartialEq)]
pub struct Board {
    size: usize,
    cells: Vec<Piece>,
    black_moves: HashMap<usize, Vec<usize>>,
    white_moves: HashMap<usize, Vec<usize>>,
    black_count: usize,
    white_count: usize,
}

impl Board {
    /// Create a board with the canonical four-stone center opening.
    pub fn new(size: usize) -> Result<Self, BoardError> {
        if size < 6 || size % 2 == 1 {
            return Err(BoardError::InvalidBoardSize(size));
        }
        let mut board = Board {
            size,
            cells: vec![Piece::Empty; size * size],
            black_moves: HashMap::new(),
            white_moves: HashMap::new(),
            black_count: 0,
            white_count: 0,
        };
        let half = size / 2;
        board.place(Piece::White, (half - 1) * size + half - 1);
        board.place(Piece::Black, (half - 1) * size + half);
        board.place(Piece::Black, half * size + half - 1);
        board.place(Piece::White, half * size + half);
        board.update_valid_moves();
        Ok(board)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn piece_at(&self, row: usize, col: usize) -> Piece {
        self.cells[row * self.size + col]
    }

    /// number of stones of `piece` on the board; `Empty` counts empty cells
    pub fn stone_count(&self, piece: Piece) -> usize {
        match piece {
            Piece::Black => self.black_count,
            Piece::White => self.white_count,
            Piece::Empty => self.size * self.size - self.black_count - self.white_count,
        }
    }

    /// Snapshot of the valid-move cache for `color`.
    ///
    /// Returned by value so callers on other tasks never observe a
    /// half-updated cache. Empty for `Piece::Empty`.
    pub fn valid_moves(&self, color: Piece) -> HashMap<usize, Vec<usize>> {
        self.cached_moves(color).cloned().unwrap_or_default()
    }

    pub fn count_valid_moves(&self, color: Piece) -> usize {
        self.cached_moves(color).map_or(0, |moves| moves.len())
    }

    pub fn is_valid_move(&self, color: Piece, row: usize, col: usize) -> bool {
        if row >= self.size || col >= self.size {
            return false;
        }
        self.cached_moves(color)
            .map_or(false, |moves| moves.contains_key(&(row * self.size + col)))
    }

    /// Play a cached legal move and flip everything it flanks.
    ///
    /// Returns the indices of all cells that changed so callers can
    /// redraw only those. A move the cache does not know is refused
    /// with `IllegalMove` instead of being ignored: the server already
    /// accepted it, so a miss here is a synchronization bug that must
    /// not be papered over.
    pub fn apply_move(
        &mut self,
        color: Piece,
        row: usize,
        col: usize,
    ) -> Result<Vec<usize>, BoardError> {
        let flips = if row < self.size && col < self.size {
            self.cached_moves(color)
                .and_then(|moves| moves.get(&(row * self.size + col)))
                .cloned()
        } else {
            None
        };
        let flips = flips.ok_or(BoardError::IllegalMove { color, row, col })?;
        for &cell in &flips {
            self.place(color, cell);
        }
        self.update_valid_moves();
        Ok(flips)
    }

    fn cached_moves(&self, color: Piece) -> Option<&HashMap<usize, Vec<usize>>> {
        match color {
            Piece::Black => Some(&self.black_moves),
            Piece::White => Some(&self.white_moves),
            Piece::Empty => None,
        }
    }

    /// overwrite a single cell, keeping the stone counts consistent
    fn place(&mut self, color: Piece, index: usize) {
        match self.cells[index] {
            Piece::Black => self.black_count -= 1,
            Piece::White => self.white_count -= 1,
            Piece::Empty => {}
        }
        match color {
            Piece::Black => self.black_count += 1,
            Piece::White => self.white_count += 1,
            Piece::Empty => {}
        }
        self.cells[index] = color;
    }

    /// Rebuild both caches from scratch.
    ///
    /// One pass over all empty cells: each of the eight neighbors
    /// decides which color could be moving (a white neighbor starts a
    /// run only black can capture, and vice versa), then the ray is
    /// checked and its flips collected for that color.
    fn update_valid_moves(&mut self) {
        let mut black_moves: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut white_moves: HashMap<usize, Vec<usize>> = HashMap::new();
        for row in 0..self.size {
            for col in 0..self.size {
                let origin = row * self.size + col;
                if !self.cells[origin].is_empty() {
                    continue;
                }
                for (dr, dc) in DIRECTIONS {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if !self.in_bounds(nr, nc) {
                        continue;
                    }
                    let run = self.at(nr, nc);
                    let mover = run.opponent();
                    if mover.is_empty() {
                        continue;
                    }
                    if !self.can_flank(nr, nc, mover, dr, dc) {
                        continue;
                    }
                    let moves = if mover.is_black() {
                        &mut black_moves
                    } else {
                        &mut white_moves
                    };
                    let flips = moves.entry(origin).or_insert_with(Vec::new);
                    if flips.is_empty() {
                        // the placed cell leads its own flip list
                        flips.push(origin);
                    }
                    self.collect_flipped(nr, nc, dr, dc, run, flips);
                }
            }
        }
        self.black_moves = black_moves;
        self.white_moves = white_moves;
    }

    /// Walk along the opponent run starting at (row, col).
    ///
    /// The direction counts only if the run terminates on one of
    /// `mover`'s own stones. Running off the board or onto an empty
    /// cell ends the scan with no flank.
    fn can_flank(&self, mut row: isize, mut col: isize, mover: Piece, dr: isize, dc: isize) -> bool {
        while self.in_bounds(row, col) && mover.is_opponent_of(self.at(row, col)) {
            row += dr;
            col += dc;
        }
        self.in_bounds(row, col) && mover.is_same_color(self.at(row, col))
    }

    /// append the opponent run starting at (row, col) to the flip list
    fn collect_flipped(
        &self,
        mut row: isize,
        mut col: isize,
        dr: isize,
        dc: isize,
        run: Piece,
        out: &mut Vec<usize>,
    ) {
        while self.in_bounds(row, col) && self.at(row, col) == run {
            out.push(row as usize * self.size + col as usize);
            row += dr;
            col += dc;
        }
    }

    fn in_bounds(&self, row: isize, col: isize) -> bool {
        0 <= row && row < self.size as isize && 0 <= col && col < self.size as isize
    }

    /// cell lookup for scan coordinates already checked by `in_bounds`
    fn at(&self, row: isize, col: isize) -> Piece {
        self.cells[row as usize * self.size + col as usize]
    }
}
