//! Scripted client for poking a running server by hand.
//!
//! Joins with a role, plays a move script written with `w`/`a`/`s`/`d`,
//! prints every message the server sends back, then quits.

use clap::{Parser, ValueEnum};
use log::{info, warn};
use shared::{ClientMessage, Direction, Role, ServerMessage, BUFFER_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Cman,
    Spirit,
    Watcher,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Cman => Role::Cman,
            RoleArg::Spirit => Role::Spirit,
            RoleArg::Watcher => Role::Watcher,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Role to join as
    #[arg(value_enum)]
    role: RoleArg,

    /// Server address to send to
    #[arg(short = 's', long, default_value = "127.0.0.1:1337")]
    server: String,

    /// Moves to play, e.g. "ddsa" (w=up, a=left, s=down, d=right)
    #[arg(short, long, default_value = "")]
    moves: String,

    /// Milliseconds to wait between moves
    #[arg(short, long, default_value = "500")]
    delay_ms: u64,

    /// Seconds to keep listening after the script before quitting
    #[arg(short, long, default_value = "2")]
    linger_secs: u64,
}

fn parse_moves(script: &str) -> Result<Vec<Direction>, String> {
    script
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c.to_ascii_lowercase() {
            'w' => Ok(Direction::Up),
            'a' => Ok(Direction::Left),
            's' => Ok(Direction::Down),
            'd' => Ok(Direction::Right),
            other => Err(format!("unknown move {:?}", other)),
        })
        .collect()
}

/// Prints everything the server sends until `deadline`. Returns true once
/// the quit confirmation has been seen.
async fn listen_until(socket: &UdpSocket, deadline: Instant) -> bool {
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }

        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => match ServerMessage::decode(&buf[..len]) {
                Ok(ServerMessage::GameState(state)) => println!(
                    "state: cman {:?} spirit {:?} collected {} attempts {} freeze {}",
                    state.c_coords, state.s_coords, state.collected, state.attempts, state.freeze
                ),
                Ok(ServerMessage::Notice(text)) => {
                    println!("notice: {}", text);
                    if text == "Quit confirmed" {
                        return true;
                    }
                }
                Ok(ServerMessage::GameOver(report)) => println!(
                    "game over: winner {} (spirit {}, cman {})",
                    report.winner, report.s_score, report.c_score
                ),
                Ok(ServerMessage::Error(error)) => println!("error: {}", error),
                Err(e) => warn!("Undecodable reply: {}", e),
            },
            Ok(Err(e)) => {
                warn!("Error receiving reply: {}", e);
                return false;
            }
            Err(_) => return false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let server_addr: SocketAddr = args.server.parse()?;
    let moves = parse_moves(&args.moves)?;
    let delay = Duration::from_millis(args.delay_ms);

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    let role = Role::from(args.role);
    socket
        .send_to(&ClientMessage::Join { role }.encode(), server_addr)
        .await?;
    info!("Sent join as {} to {}", role, server_addr);
    listen_until(&socket, Instant::now() + delay).await;

    for direction in moves {
        socket
            .send_to(&ClientMessage::Move { direction }.encode(), server_addr)
            .await?;
        listen_until(&socket, Instant::now() + delay).await;
    }

    listen_until(&socket, Instant::now() + Duration::from_secs(args.linger_secs)).await;

    socket
        .send_to(&ClientMessage::Quit.encode(), server_addr)
        .await?;
    if !listen_until(&socket, Instant::now() + Duration::from_secs(2)).await {
        warn!("No quit confirmation received");
    }

    println!("Test client finished");
    Ok(())
}
