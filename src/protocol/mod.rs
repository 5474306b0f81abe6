//! The line-based wire protocol spoken with the game server.
//!
//! One ASCII command or event per newline-terminated line. The server
//! is authoritative: the client proposes moves and only mutates its
//! board when the server echoes them back.
mod messages;

pub use messages::{ClientCommand, ServerEvent, UnknownCommand};

/// address of the game server the original client is hardwired to
pub const DEFAULT_ADDRESS: &str = "localhost:10000";
pub const DEFAULT_PORT: u16 = 10000;

/// player names travel in a space-delimited line, so they are capped
/// and must not contain whitespace
pub const MAX_PLAYER_NAME_GRAPHEMES: usize = 32;
