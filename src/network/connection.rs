//! A wrapper to convert a TCP connection into channel `Sender` and `Receiver`.
//!
//! The protocol is one ASCII message per newline-terminated line, so the
//! wrapper is generic over a line codec: outgoing messages encode with
//! `Into<String>`, incoming lines decode with `TryFrom<String>`.
//!
//! ## feature:
//!
//! - In-order dispatch: a single reader task forwards decoded events
//!   through one bounded channel, so consumers see them exactly in the
//!   order the server sent them.
//! - Forward tolerance: a line that fails to decode is logged and
//!   skipped; unknown message types never close the connection.
//! - Terminal error report: when the peer closes the stream or a read
//!   fails, the reader forwards exactly one `Received::Error` and stops.
//!   There is no reconnection and no read timeout; the read blocks until
//!   data arrives or the peer goes away.
//!
//! When every `Sender` clone is dropped, the write side of the socket is
//! closed. A write failure closes both sides. Dropping the `Conn` struct
//! therefore tears the whole connection down.
use crate::CHANNEL_SIZE;
use async_std::channel::{bounded, Receiver, Sender};
use async_std::io::BufReader;
use async_std::net::TcpStream;
use async_std::prelude::Stream;
use async_std::task;
use futures::{AsyncBufReadExt, AsyncWriteExt, StreamExt};
use log::warn;
use std::fmt::{Display, Formatter};
use std::net::Shutdown;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Connection portal, returned by `handle_connection`.
///
/// The first type parameter is the type of messages sent,
/// the second type parameter is the type of events received.
///
/// dropping this struct closes the connection
pub struct Conn<Msg, Rsp> {
    sender: Sender<Msg>,
    receiver: Receiver<Received<Rsp>>,
}

impl<Msg, Rsp> Conn<Msg, Rsp> {
    pub fn sender(&self) -> &Sender<Msg> {
        &self.sender
    }

    /// separate the outbound half from the inbound half
    pub fn split(self) -> (Sender<Msg>, Receiver<Received<Rsp>>) {
        (self.sender, self.receiver)
    }
}

impl<Msg, Rsp> Stream for Conn<Msg, Rsp> {
    type Item = Received<Rsp>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

/// wrapper of events received
#[derive(Clone, Debug, PartialEq)]
pub enum Received<T> {
    /// a decoded protocol event
    Event(T),
    /// the stream ended or a read failed; nothing follows this
    Error(ConnectionError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionError {
    /// the peer closed the stream
    Closed,
    /// reading from the socket failed
    Io(String),
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Closed => f.write_str("connection closed by peer"),
            ConnectionError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Convert `tcp` into a pair of message channels by spawning one send
/// loop and one receive loop.
pub fn handle_connection<Msg, Rsp>(tcp: TcpStream) -> Conn<Msg, Rsp>
where
    Msg: Send + 'static + Into<String>,
    Rsp: Send + 'static + TryFrom<String>,
    <Rsp as TryFrom<String>>::Error: Display + Send,
{
    let (msg_sender, msg_receiver) = bounded(CHANNEL_SIZE);
    let (rsp_sender, rsp_receiver) = bounded(CHANNEL_SIZE);
    send_messages(&tcp, msg_receiver);
    retrieve_messages::<Rsp>(&tcp, rsp_sender);
    Conn {
        sender: msg_sender,
        receiver: rsp_receiver,
    }
}

/// This function takes the ownership of `Receiver<Msg>`.
///
/// Each message becomes one newline-terminated line, written and flushed
/// immediately. Dropping all instances of `Sender<Msg>` closes the
/// *write* side of the connection; a write error closes both sides.
fn send_messages<Msg>(tcp: &TcpStream, mut messages: Receiver<Msg>)
where
    Msg: Send + 'static + Into<String>,
{
    let mut tcp = tcp.clone();
    task::spawn(async move {
        while let Some(msg) = messages.next().await {
            let mut line: String = msg.into();
            line.push('\n');
            if write_line(&mut tcp, &line).await.is_err() {
                let _ = tcp.shutdown(Shutdown::Both);
                return;
            }
        }
        let _ = tcp.shutdown(Shutdown::Write);
    });
}

async fn write_line(tcp: &mut TcpStream, line: &str) -> std::io::Result<()> {
    tcp.write_all(line.as_bytes()).await?;
    tcp.flush().await
}

/// This function takes the ownership of the only instance of
/// `Sender<Received<Rsp>>`.
///
/// Decoded lines are forwarded in arrival order. Undecodable lines are
/// logged and skipped. End of stream and read errors are forwarded once
/// as `Received::Error`, then the loop stops for good.
fn retrieve_messages<Rsp>(tcp: &TcpStream, events: Sender<Received<Rsp>>)
where
    Rsp: Send + 'static + TryFrom<String>,
    <Rsp as TryFrom<String>>::Error: Display + Send,
{
    let tcp = tcp.clone();
    let inner = tcp.clone();
    task::spawn(async move {
        let reader = BufReader::new(inner);
        let mut lines = reader.lines();
        loop {
            match lines.next().await {
                Some(Ok(line)) => match Rsp::try_from(line) {
                    Ok(event) => {
                        // if the receiver got dropped, stop reading
                        if events.send(Received::Event(event)).await.is_err() {
                            let _ = tcp.shutdown(Shutdown::Read);
                            break;
                        }
                    }
                    Err(e) => warn!("skipping undecodable line: {}", e),
                },
                Some(Err(e)) => {
                    let _ = events
                        .send(Received::Error(ConnectionError::Io(e.to_string())))
                        .await;
                    let _ = tcp.shutdown(Shutdown::Both);
                    break;
                }
                // no more lines to read
                None => {
                    let _ = events.send(Received::Error(ConnectionError::Closed)).await;
                    let _ = tcp.shutdown(Shutdown::Read);
                    break;
                }
            }
        }
    });
}
