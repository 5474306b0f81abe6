use crate::game::Piece;
use std::fmt::{Display, Formatter};

/// commands sent from the client to the server
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ClientCommand {
    /// handshake, sent once right after the stream opens
    Connect {
        player_name: String,
        board_size: usize,
    },
    /// propose a move at zero-based (row, col);
    /// the board is not touched until the server accepts it
    Move { row: usize, col: usize },
    /// concede the game
    Resign,
}

/// events sent from the server to the client
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ServerEvent {
    /// the game begins and the server assigns the local color
    GameStart(Piece),
    /// the local player may move
    YourTurn,
    /// the opponent may move
    OpponentTurn,
    /// an accepted move by whoever holds the turn; the flips are
    /// recomputed locally, not transmitted
    MoveAccepted { row: usize, col: usize },
    /// final result token (WIN/LOSE/DRAW or anything the server says)
    /// with the black and white stone counts
    GameOver {
        result: String,
        black_count: usize,
        white_count: usize,
    },
    /// free-text server complaint, non-fatal
    ServerError(String),
}

/// a line whose leading token or arguments could not be decoded;
/// logged and skipped, never fatal to the connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl Display for UnknownCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown command: {:?}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl From<ClientCommand> for String {
    fn from(command: ClientCommand) -> String {
        match command {
            ClientCommand::Connect {
                player_name,
                board_size,
            } => format!("CONNECT {} {}", player_name, board_size),
            ClientCommand::Move { row, col } => format!("MOVE {} {}", row, col),
            ClientCommand::Resign => "RESIGN".to_string(),
        }
    }
}

impl TryFrom<String> for ServerEvent {
    type Error = UnknownCommand;

    fn try_from(line: String) -> Result<Self, Self::Error> {
        match decode(&line) {
            Some(event) => Ok(event),
            None => Err(UnknownCommand(line)),
        }
    }
}

fn decode(line: &str) -> Option<ServerEvent> {
    let mut tokens = line.split_whitespace();
    match tokens.next()? {
        "GAME_START" => match tokens.next()? {
            "BLACK" => Some(ServerEvent::GameStart(Piece::Black)),
            "WHITE" => Some(ServerEvent::GameStart(Piece::White)),
            _ => None,
        },
        "YOUR_TURN" => Some(ServerEvent::YourTurn),
        "OPPONENT_TURN" => Some(ServerEvent::OpponentTurn),
        "MOVE_ACCEPTED" => {
            let (row, col) = parse_pair(tokens.next(), tokens.next())?;
            Some(ServerEvent::MoveAccepted { row, col })
        }
        "GAME_OVER" => {
            let result = tokens.next()?;
            let (black_count, white_count) = parse_pair(tokens.next(), tokens.next())?;
            Some(ServerEvent::GameOver {
                result: result.to_string(),
                black_count,
                white_count,
            })
        }
        "ERROR" => {
            // everything after the leading token is free text
            let message = line.trim_start().split_once(' ').map_or("", |(_, rest)| rest);
            Some(ServerEvent::ServerError(message.to_string()))
        }
        _ => None,
    }
}

fn parse_pair(first: Option<&str>, second: Option<&str>) -> Option<(usize, usize)> {
    match (first?.parse(), second?.parse()) {
        (Ok(first), Ok(second)) => Some((first, second)),
        _ => None,
    }
}
