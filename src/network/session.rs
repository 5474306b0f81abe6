use crate::network::connection::{handle_connection, Received};
use crate::protocol::{ClientCommand, ServerEvent, MAX_PLAYER_NAME_GRAPHEMES};
use async_std::channel::{Receiver, Sender};
use async_std::net::TcpStream;
use log::info;
use std::fmt::{Display, Formatter};
use std::net::Shutdown;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug)]
pub enum SessionError {
    /// the player name cannot travel in the space-delimited wire format
    InvalidPlayerName(String),
    /// establishing the stream failed; not retried here
    Connect(std::io::Error),
    /// writing on a connection that is already closed or errored
    Send,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidPlayerName(reason) => {
                write!(f, "invalid player name: {}", reason)
            }
            SessionError::Connect(e) => write!(f, "failed to connect: {}", e),
            SessionError::Send => f.write_str("connection closed, message not sent"),
        }
    }
}

impl std::error::Error for SessionError {}

/// A live session with the game server.
///
/// # Convention
///
/// The session opens by sending `CONNECT <name> <size>`. Everything the
/// server says afterwards comes out of the event receiver in arrival
/// order, ending with a single `Received::Error` when the connection
/// dies. Retry policy belongs to the caller; nothing here reconnects.
pub struct Session {
    sender: SessionSender,
    events: Receiver<Received<ServerEvent>>,
}

impl Session {
    pub async fn connect(
        address: &str,
        player_name: &str,
        board_size: usize,
    ) -> Result<Session, SessionError> {
        validate_player_name(player_name)?;
        let tcp = TcpStream::connect(address)
            .await
            .map_err(SessionError::Connect)?;
        let (commands, events) = handle_connection(tcp.clone()).split();
        let sender = SessionSender {
            commands,
            stream: Some(tcp),
        };
        sender
            .send(ClientCommand::Connect {
                player_name: player_name.to_string(),
                board_size,
            })
            .await?;
        info!("connected to {} as {}", address, player_name);
        Ok(Session { sender, events })
    }

    /// split into the outbound half and the inbound event stream
    pub fn split(self) -> (SessionSender, Receiver<Received<ServerEvent>>) {
        (self.sender, self.events)
    }

    /// session endpoints without a socket, for exercising consumers in tests
    #[cfg(test)]
    pub(crate) fn from_channels(
        commands: Sender<ClientCommand>,
        events: Receiver<Received<ServerEvent>>,
    ) -> Session {
        Session {
            sender: SessionSender {
                commands,
                stream: None,
            },
            events,
        }
    }
}

/// outbound half of a session, cheap to clone
#[derive(Clone)]
pub struct SessionSender {
    commands: Sender<ClientCommand>,
    stream: Option<TcpStream>,
}

impl SessionSender {
    /// propose a move; the board is only updated on the server's echo
    pub async fn send_move(&self, row: usize, col: usize) -> Result<(), SessionError> {
        self.send(ClientCommand::Move { row, col }).await
    }

    pub async fn send_resign(&self) -> Result<(), SessionError> {
        self.send(ClientCommand::Resign).await
    }

    async fn send(&self, command: ClientCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Send)
    }

    /// Close the connection.
    ///
    /// Safe to call more than once. Close errors are swallowed, there is
    /// nothing useful a caller could do with them.
    pub fn disconnect(&self) {
        if let Some(tcp) = &self.stream {
            let _ = tcp.shutdown(Shutdown::Both);
        }
    }
}

fn validate_player_name(name: &str) -> Result<(), SessionError> {
    if name.is_empty() {
        return Err(SessionError::InvalidPlayerName("name is empty".to_string()));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(SessionError::InvalidPlayerName(
            "name must not contain whitespace".to_string(),
        ));
    }
    if name.graphemes(true).count() > MAX_PLAYER_NAME_GRAPHEMES {
        return Err(SessionError::InvalidPlayerName(format!(
            "name longer than {} characters",
            MAX_PLAYER_NAME_GRAPHEMES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test_session {
    use super::*;
    use async_std::io::BufReader;
    use async_std::net::TcpListener;
    use async_std::task;
    use futures::executor::block_on;
    use futures::{AsyncBufReadExt, StreamExt};

    #[test]
    fn test_player_name_validation() {
        assert!(validate_player_name("alice").is_ok());
        assert!(validate_player_name("小雨").is_ok());
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("two words").is_err());
        assert!(validate_player_name("tab\there").is_err());
        assert!(validate_player_name(&"x".repeat(33)).is_err());
        assert!(validate_player_name(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn test_connect_sends_handshake_then_moves() {
        block_on(async {
            let listener = TcpListener::bind("127.0.0.1:18954").await.unwrap();
            let server = task::spawn(async move {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut lines = BufReader::new(tcp).lines();
                let first = lines.next().await;
                let second = lines.next().await;
                (first, second)
            });
            let session = Session::connect("127.0.0.1:18954", "小雨", 8).await.unwrap();
            let (sender, _events) = session.split();
            sender.send_move(2, 3).await.unwrap();
            let (first, second) = server.await;
            assert_eq!(first.unwrap().unwrap(), "CONNECT 小雨 8");
            assert_eq!(second.unwrap().unwrap(), "MOVE 2 3");
            sender.disconnect();
            // disconnect is idempotent
            sender.disconnect();
        });
    }

    #[test]
    fn test_bad_name_fails_before_dialing() {
        block_on(async {
            match Session::connect("127.0.0.1:18955", "no spaces", 8).await {
                Err(SessionError::InvalidPlayerName(_)) => {}
                Err(other) => panic!("expected InvalidPlayerName, got {:?}", other),
                Ok(_) => panic!("expected InvalidPlayerName, got a session"),
            }
        });
    }
}
