use crate::client::messages::{GameNotification, GamePhase, UserIntent};
use crate::game::{Board, Piece};
use crate::network::{ConnectionError, Received, Session, SessionSender};
use crate::protocol::ServerEvent;
use crate::CHANNEL_SIZE;
use anyhow::{Error, Result};
use async_std::channel::{bounded, Receiver, Sender};
use async_std::task;
use futures::{select, StreamExt};
use log::{error, info, warn};

/// Handle used by the presentation layer to drive the controller.
///
/// All methods enqueue intents; the controller task applies them on its
/// own serialized path. Calls after the controller stopped are ignored.
#[derive(Clone)]
pub struct GameHandle {
    intents: Sender<UserIntent>,
}

impl GameHandle {
    /// User selected cell (row, col).
    ///
    /// Ignored unless it is the local player's turn and the cell is
    /// legal. Clicking a bad cell is normal use, not an error.
    pub async fn set_piece(&self, row: usize, col: usize) {
        let _ = self.intents.send(UserIntent::Play(row, col)).await;
    }

    /// resign; the game only ends when the server answers GAME_OVER
    pub async fn give_up(&self) {
        let _ = self.intents.send(UserIntent::Resign).await;
    }

    /// close the connection and stop the controller
    pub async fn disconnect(&self) {
        let _ = self.intents.send(UserIntent::Disconnect).await;
    }
}

/// Start the client state machine on its own task.
///
/// The task is the only owner of the board. Server events and user
/// intents funnel through one ordered queue, so turn state and board
/// never see concurrent writers, and events apply in exactly the order
/// the server sent them.
pub fn start_controller(
    board: Board,
    session: Session,
) -> (GameHandle, Receiver<GameNotification>) {
    let (intent_sender, intent_receiver) = bounded(CHANNEL_SIZE);
    let (notifier, notifications) = bounded(CHANNEL_SIZE);
    task::spawn(run_controller(board, session, intent_receiver, notifier));
    (
        GameHandle {
            intents: intent_sender,
        },
        notifications,
    )
}

/// messages funneled into the controller loop
enum Message {
    Server(Received<ServerEvent>),
    User(UserIntent),
}

struct Controller {
    board: Board,
    /// assigned once by GAME_START, never changes afterwards
    my_color: Piece,
    current_turn: Piece,
    phase: GamePhase,
}

async fn run_controller(
    board: Board,
    session: Session,
    intents: Receiver<UserIntent>,
    notifier: Sender<GameNotification>,
) {
    let (sender, events) = session.split();
    let mut messages = message_receiver(events, intents);
    let mut state = Controller {
        board,
        my_color: Piece::Empty,
        current_turn: Piece::Empty,
        phase: GamePhase::AwaitingStart,
    };
    while let Some(message) = messages.next().await {
        if match message {
            Message::Server(Received::Event(event)) => {
                handle_event(event, &mut state, &notifier).await
            }
            Message::Server(Received::Error(e)) => on_network_error(e, &notifier).await,
            Message::User(intent) => handle_intent(intent, &state, &sender, &notifier).await,
        }
        .is_err()
        {
            break;
        }
    }
}

/// This is a router that collects server events and user intents into
/// one ordered queue.
///
/// The router stops when either source ends or when the controller
/// drops the queue.
fn message_receiver(
    events: Receiver<Received<ServerEvent>>,
    intents: Receiver<UserIntent>,
) -> Receiver<Message> {
    let (message_sender, messages) = bounded(CHANNEL_SIZE);
    task::spawn(async move {
        let mut events = events.fuse();
        let mut intents = intents.fuse();
        while let Some(message) = select! {
            event = events.next() => event.map(Message::Server),
            intent = intents.next() => intent.map(Message::User),
        } {
            if message_sender.send(message).await.is_err() {
                break;
            }
        }
    });
    messages
}

/// the error of this function means the controller should stop
async fn handle_event(
    event: ServerEvent,
    state: &mut Controller,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    match event {
        ServerEvent::GameStart(color) => on_game_start(color, state, notifier).await,
        ServerEvent::YourTurn => on_your_turn(state, notifier).await,
        ServerEvent::OpponentTurn => on_opponent_turn(state, notifier).await,
        ServerEvent::MoveAccepted { row, col } => {
            on_move_accepted(row, col, state, notifier).await
        }
        ServerEvent::GameOver {
            result,
            black_count,
            white_count,
        } => on_game_over(result, black_count, white_count, state, notifier).await,
        ServerEvent::ServerError(message) => on_server_error(message, notifier).await,
    }
}

async fn on_game_start(
    color: Piece,
    state: &mut Controller,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    if state.phase != GamePhase::AwaitingStart {
        warn!("GAME_START received in {:?}, ignored", state.phase);
        return Ok(());
    }
    state.my_color = color;
    // black always opens
    state.current_turn = Piece::Black;
    state.phase = if color.is_black() {
        GamePhase::MyTurn
    } else {
        GamePhase::OpponentTurn
    };
    info!("game started, playing {}", color);
    notifier
        .send(GameNotification::GameStarted { color })
        .await?;
    Ok(())
}

async fn on_your_turn(state: &mut Controller, notifier: &Sender<GameNotification>) -> Result<()> {
    state.current_turn = state.my_color;
    state.phase = GamePhase::MyTurn;
    notifier
        .send(GameNotification::YourTurn {
            valid_moves: legal_cells(state),
        })
        .await?;
    Ok(())
}

async fn on_opponent_turn(
    state: &mut Controller,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    state.current_turn = state.my_color.opponent();
    state.phase = GamePhase::OpponentTurn;
    notifier.send(GameNotification::OpponentTurn).await?;
    Ok(())
}

/// The server accepted a move for whoever holds the turn.
///
/// Replay it on the local board and report every cell that changed. An
/// `IllegalMove` here means a move the server accepted is unknown
/// locally, so the boards have diverged and nothing local can be
/// trusted anymore; the controller reports once and stops.
async fn on_move_accepted(
    row: usize,
    col: usize,
    state: &mut Controller,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    match state.board.apply_move(state.current_turn, row, col) {
        Ok(changed) => {
            let size = state.board.size();
            for cell in changed {
                notifier
                    .send(GameNotification::CellChanged {
                        row: cell / size,
                        col: cell % size,
                        piece: state.current_turn,
                    })
                    .await?;
            }
            Ok(())
        }
        Err(e) => {
            error!("board desynchronized: {}", e);
            notifier
                .send(GameNotification::Message(format!(
                    "board desynchronized: {}",
                    e
                )))
                .await?;
            Err(Error::msg("board desynchronized"))
        }
    }
}

async fn on_game_over(
    result: String,
    black_count: usize,
    white_count: usize,
    state: &mut Controller,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    state.phase = GamePhase::GameOver;
    info!("game over: {} ({} - {})", result, black_count, white_count);
    notifier
        .send(GameNotification::GameEnded {
            result,
            black_count,
            white_count,
        })
        .await?;
    Ok(())
}

async fn on_server_error(message: String, notifier: &Sender<GameNotification>) -> Result<()> {
    warn!("server error: {}", message);
    notifier
        .send(GameNotification::Message(format!(
            "server error: {}",
            message
        )))
        .await?;
    Ok(())
}

/// the receive loop reports a dead connection exactly once; freeze here
async fn on_network_error(
    e: ConnectionError,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    error!("network error: {}", e);
    notifier
        .send(GameNotification::NetworkError(e.to_string()))
        .await?;
    Err(Error::msg("connection lost"))
}

/// the error of this function means the controller should stop
async fn handle_intent(
    intent: UserIntent,
    state: &Controller,
    sender: &SessionSender,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    match intent {
        UserIntent::Play(row, col) => on_play_intent(row, col, state, sender, notifier).await,
        UserIntent::Resign => on_resign_intent(state, sender, notifier).await,
        UserIntent::Disconnect => {
            sender.disconnect();
            Err(Error::msg("disconnected by user"))
        }
    }
}

/// Forward the move to the server if it stands a chance.
///
/// The board stays untouched either way. It only changes when the
/// server answers with MOVE_ACCEPTED, so the local and the
/// authoritative view can never drift apart, even when the server
/// rejects the proposal.
async fn on_play_intent(
    row: usize,
    col: usize,
    state: &Controller,
    sender: &SessionSender,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    if state.phase != GamePhase::MyTurn {
        return Ok(());
    }
    if !state.board.is_valid_move(state.current_turn, row, col) {
        return Ok(());
    }
    if let Err(e) = sender.send_move(row, col).await {
        error!("failed to send move: {}", e);
        notifier
            .send(GameNotification::NetworkError(e.to_string()))
            .await?;
        return Err(Error::msg("send failed"));
    }
    info!("move sent: ({}, {})", row, col);
    Ok(())
}

async fn on_resign_intent(
    state: &Controller,
    sender: &SessionSender,
    notifier: &Sender<GameNotification>,
) -> Result<()> {
    if state.phase == GamePhase::GameOver {
        return Ok(());
    }
    if let Err(e) = sender.send_resign().await {
        error!("failed to resign: {}", e);
        notifier
            .send(GameNotification::NetworkError(e.to_string()))
            .await?;
        return Err(Error::msg("send failed"));
    }
    Ok(())
}

/// sorted snapshot of the legal placements for the local color
fn legal_cells(state: &Controller) -> Vec<(usize, usize)> {
    let size = state.board.size();
    let mut cells: Vec<(usize, usize)> = state
        .board
        .valid_moves(state.my_color)
        .keys()
        .map(|&index| (index / size, index % size))
        .collect();
    cells.sort_unstable();
    cells
}

#[cfg(test)]
mod test_controller {
    use super::*;
    use crate::protocol::ClientCommand;
    use futures::executor::block_on;
    use std::time::Duration;

    fn test_rig() -> (
        Sender<Received<ServerEvent>>,
        Receiver<ClientCommand>,
        GameHandle,
        Receiver<GameNotification>,
    ) {
        let (event_sender, event_receiver) = bounded(CHANNEL_SIZE);
        let (command_sender, command_receiver) = bounded(CHANNEL_SIZE);
        let session = Session::from_channels(command_sender, event_receiver);
        let (handle, notifications) = start_controller(Board::new(8).unwrap(), session);
        (event_sender, command_receiver, handle, notifications)
    }

    async fn settle() {
        task::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn test_game_start_assigns_color_and_turn() {
        block_on(async {
            let (events, _commands, _handle, mut notifications) = test_rig();
            events
                .send(Received::Event(ServerEvent::GameStart(Piece::Black)))
                .await
                .unwrap();
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::GameStarted {
                    color: Piece::Black
                })
            );
            events
                .send(Received::Event(ServerEvent::YourTurn))
                .await
                .unwrap();
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::YourTurn {
                    valid_moves: vec![(2, 3), (3, 2), (4, 5), (5, 4)],
                })
            );
        });
    }

    #[test]
    fn test_board_waits_for_server_echo() {
        block_on(async {
            let (events, mut commands, handle, mut notifications) = test_rig();
            events
                .send(Received::Event(ServerEvent::GameStart(Piece::Black)))
                .await
                .unwrap();
            assert!(matches!(
                notifications.next().await,
                Some(GameNotification::GameStarted { .. })
            ));
            handle.set_piece(2, 3).await;
            assert_eq!(
                commands.next().await,
                Some(ClientCommand::Move { row: 2, col: 3 })
            );
            // the proposal alone changes nothing
            settle().await;
            assert!(notifications.try_recv().is_err());
            // the authoritative echo does
            events
                .send(Received::Event(ServerEvent::MoveAccepted { row: 2, col: 3 }))
                .await
                .unwrap();
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::CellChanged {
                    row: 2,
                    col: 3,
                    piece: Piece::Black
                })
            );
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::CellChanged {
                    row: 3,
                    col: 3,
                    piece: Piece::Black
                })
            );
            events
                .send(Received::Event(ServerEvent::OpponentTurn))
                .await
                .unwrap();
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::OpponentTurn)
            );
        });
    }

    #[test]
    fn test_clicks_ignored_when_not_playable() {
        block_on(async {
            let (events, mut commands, handle, mut notifications) = test_rig();
            // before the game starts nothing leaves the client
            handle.set_piece(2, 3).await;
            settle().await;
            events
                .send(Received::Event(ServerEvent::GameStart(Piece::White)))
                .await
                .unwrap();
            assert!(matches!(
                notifications.next().await,
                Some(GameNotification::GameStarted { .. })
            ));
            // black opens, so white clicking now is out of turn
            handle.set_piece(4, 2).await;
            settle().await;
            events
                .send(Received::Event(ServerEvent::YourTurn))
                .await
                .unwrap();
            assert!(matches!(
                notifications.next().await,
                Some(GameNotification::YourTurn { .. })
            ));
            // legal for black but not for white
            handle.set_piece(2, 3).await;
            // a legal white move does go out
            handle.set_piece(4, 2).await;
            assert_eq!(
                commands.next().await,
                Some(ClientCommand::Move { row: 4, col: 2 })
            );
            settle().await;
            assert!(commands.try_recv().is_err());
        });
    }

    #[test]
    fn test_game_over_freezes_moves() {
        block_on(async {
            let (events, mut commands, handle, mut notifications) = test_rig();
            events
                .send(Received::Event(ServerEvent::GameStart(Piece::Black)))
                .await
                .unwrap();
            events
                .send(Received::Event(ServerEvent::YourTurn))
                .await
                .unwrap();
            events
                .send(Received::Event(ServerEvent::GameOver {
                    result: "DRAW".to_string(),
                    black_count: 32,
                    white_count: 32,
                }))
                .await
                .unwrap();
            assert!(matches!(
                notifications.next().await,
                Some(GameNotification::GameStarted { .. })
            ));
            assert!(matches!(
                notifications.next().await,
                Some(GameNotification::YourTurn { .. })
            ));
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::GameEnded {
                    result: "DRAW".to_string(),
                    black_count: 32,
                    white_count: 32,
                })
            );
            // no moves and no resignation after the game ended
            handle.set_piece(2, 3).await;
            handle.give_up().await;
            settle().await;
            assert!(commands.try_recv().is_err());
        });
    }

    #[test]
    fn test_resign_forwarded() {
        block_on(async {
            let (events, mut commands, handle, mut notifications) = test_rig();
            events
                .send(Received::Event(ServerEvent::GameStart(Piece::Black)))
                .await
                .unwrap();
            assert!(matches!(
                notifications.next().await,
                Some(GameNotification::GameStarted { .. })
            ));
            handle.give_up().await;
            assert_eq!(commands.next().await, Some(ClientCommand::Resign));
        });
    }

    #[test]
    fn test_server_error_is_status_text() {
        block_on(async {
            let (events, _commands, _handle, mut notifications) = test_rig();
            events
                .send(Received::Event(ServerEvent::ServerError(
                    "not your turn".to_string(),
                )))
                .await
                .unwrap();
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::Message(
                    "server error: not your turn".to_string()
                ))
            );
        });
    }

    #[test]
    fn test_network_error_reported_once() {
        block_on(async {
            let (events, _commands, _handle, mut notifications) = test_rig();
            events
                .send(Received::Error(ConnectionError::Closed))
                .await
                .unwrap();
            assert_eq!(
                notifications.next().await,
                Some(GameNotification::NetworkError(
                    "connection closed by peer".to_string()
                ))
            );
            // the controller stops and the notification stream ends
            assert_eq!(notifications.next().await, None);
        });
    }

    #[test]
    fn test_desync_stops_the_controller() {
        block_on(async {
            let (events, _commands, _handle, mut notifications) = test_rig();
            events
                .send(Received::Event(ServerEvent::GameStart(Piece::Black)))
                .await
                .unwrap();
            assert!(matches!(
                notifications.next().await,
                Some(GameNotification::GameStarted { .. })
            ));
            // the server accepts a move the local board knows is illegal
            events
                .send(Received::Event(ServerEvent::MoveAccepted { row: 0, col: 0 }))
                .await
                .unwrap();
            match notifications.next().await {
                Some(GameNotification::Message(message)) => {
                    assert!(message.contains("desynchronized"));
                }
                other => panic!("expected desync message, got {:?}", other),
            }
            assert_eq!(notifications.next().await, None);
        });
    }

    #[test]
    fn test_disconnect_stops_the_controller() {
        block_on(async {
            let (_events, _commands, handle, mut notifications) = test_rig();
            handle.disconnect().await;
            assert_eq!(notifications.next().await, None);
        });
    }
}
