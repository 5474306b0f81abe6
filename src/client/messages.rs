use crate::game::Piece;

/// intents issued by the presentation layer
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum UserIntent {
    /// user selected cell (row, col)
    Play(usize, usize),
    /// user resigned
    Resign,
    /// tear the connection down and stop the controller
    Disconnect,
}

/// turn-taking states of the client
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GamePhase {
    /// connected, waiting for the server to pair the players
    AwaitingStart,
    MyTurn,
    OpponentTurn,
    /// terminal; no further moves leave the client
    GameOver,
}

/// Notifications consumed by the presentation layer.
///
/// Every payload is a snapshot. The controller keeps mutating its board
/// after sending, so nothing here aliases live state.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GameNotification {
    /// the server started the game and assigned the local color
    GameStarted { color: Piece },
    /// the local player holds the turn; `valid_moves` lists every legal
    /// (row, col) placement, sorted, for highlighting
    YourTurn { valid_moves: Vec<(usize, usize)> },
    /// the opponent holds the turn
    OpponentTurn,
    /// cell (row, col) now shows `piece`
    CellChanged { row: usize, col: usize, piece: Piece },
    /// status text for the user
    Message(String),
    /// final result token with the black and white stone counts
    GameEnded {
        result: String,
        black_count: usize,
        white_count: usize,
    },
    /// the connection died; nothing further will arrive
    NetworkError(String),
}
