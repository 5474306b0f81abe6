pub mod client;
pub mod game;
pub(crate) mod network;
pub mod protocol;

pub use client::{start_controller, GameHandle, GameNotification, GamePhase, UserIntent};
pub use game::{Board, BoardError, Piece};
pub use network::{Conn, ConnectionError, Received, Session, SessionError, SessionSender};
pub use protocol::{ClientCommand, ServerEvent, UnknownCommand, DEFAULT_ADDRESS, DEFAULT_PORT};

pub(crate) const CHANNEL_SIZE: usize = 20;
