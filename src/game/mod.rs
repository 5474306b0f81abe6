mod board;
mod piece;

pub use board::{Board, BoardError};
pub use piece::Piece;
