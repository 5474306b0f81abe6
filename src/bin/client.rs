use anyhow::{Error, Result};
use async_std::channel::Receiver;
use async_std::io::{stdin, BufReader, Stdin};
use async_std::task;
use async_std::task::{block_on, JoinHandle};
use futures::{join, AsyncBufReadExt, StreamExt};
use log::{error, warn, LevelFilter};
use othello::{
    start_controller, Board, GameHandle, GameNotification, Piece, Session, DEFAULT_ADDRESS,
};
use std::env;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();
    if let Err(e) = block_on(run_client()) {
        error!("client stopped on error {}", e);
        std::process::exit(1);
    }
}

async fn run_client() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        Err(Error::msg(
            "usage: ./client {player name} {board size} [{server address}], \
             example: ./client alice 8 localhost:10000",
        ))?
    }
    let player_name = &args[1];
    let board_size: usize = args[2]
        .parse()
        .map_err(|_| Error::msg("board size must be an even number >= 6"))?;
    let address = args.get(3).map(String::as_str).unwrap_or(DEFAULT_ADDRESS);
    let board = Board::new(board_size)?;
    let grid: Vec<Vec<char>> = (0..board_size)
        .map(|row| {
            (0..board_size)
                .map(|col| piece_char(board.piece_at(row, col)))
                .collect()
        })
        .collect();
    let session = Session::connect(address, player_name, board_size).await?;
    let (handle, notifications) = start_controller(board, session);
    println!("connected to {}, waiting for an opponent", address);
    print_help();
    let input = accept_input(stdin(), handle);
    let output = print_notifications(notifications, grid);
    join!(input, output);
    Ok(())
}

fn accept_input(input: Stdin, handle: GameHandle) -> JoinHandle<()> {
    task::spawn(async move {
        let reader = BufReader::new(input);
        let mut lines = reader.lines();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if !dispatch_command(&line, &handle).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!("read line error: {}", e);
                }
            }
        }
    })
}

/// returns false when the client should exit
async fn dispatch_command(line: &str, handle: &GameHandle) -> bool {
    let line = line.trim().to_lowercase();
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("move") => {
            let row = tokens.next().and_then(|t| t.parse::<usize>().ok());
            let col = tokens.next().and_then(|t| t.parse::<usize>().ok());
            match (row, col) {
                (Some(row), Some(col)) => handle.set_piece(row, col).await,
                _ => print_help(),
            }
            true
        }
        Some("resign") => {
            handle.give_up().await;
            true
        }
        Some("quit") => {
            handle.disconnect().await;
            false
        }
        _ => {
            print_help();
            true
        }
    }
}

fn print_notifications(
    mut notifications: Receiver<GameNotification>,
    mut grid: Vec<Vec<char>>,
) -> JoinHandle<()> {
    task::spawn(async move {
        while let Some(notification) = notifications.next().await {
            match notification {
                GameNotification::GameStarted { color } => {
                    println!("game started! you play {}", color);
                }
                GameNotification::CellChanged { row, col, piece } => {
                    grid[row][col] = piece_char(piece);
                }
                GameNotification::YourTurn { valid_moves } => {
                    print_grid(&grid);
                    println!("your turn, legal moves: {:?}", valid_moves);
                }
                GameNotification::OpponentTurn => {
                    print_grid(&grid);
                    println!("opponent's turn");
                }
                GameNotification::Message(message) => {
                    println!("{}", message);
                }
                GameNotification::GameEnded {
                    result,
                    black_count,
                    white_count,
                } => {
                    print_grid(&grid);
                    println!(
                        "game over: {} (black {} - white {})",
                        result, black_count, white_count
                    );
                }
                GameNotification::NetworkError(message) => {
                    error!("connection error: {}", message);
                    break;
                }
            }
        }
        println!("session ended");
    })
}

fn print_grid(grid: &[Vec<char>]) {
    for row in grid {
        println!("{}", row.iter().collect::<String>());
    }
}

fn piece_char(piece: Piece) -> char {
    match piece {
        Piece::Black => 'X',
        Piece::White => 'O',
        Piece::Empty => '.',
    }
}

fn print_help() {
    println!("commands:");
    println!("  move {{row}} {{col}}   propose a move, zero-based coordinates");
    println!("  resign             concede the game");
    println!("  quit               close the connection and exit");
}
