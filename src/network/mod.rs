//! Network Infrastructure
//!
//! This module contains the channel wrapper around the TCP stream and
//! the game-server session built on top of it.
pub(crate) mod connection;
pub(crate) mod session;
pub use connection::{handle_connection, Conn, ConnectionError, Received};
pub use session::{Session, SessionError, SessionSender};
