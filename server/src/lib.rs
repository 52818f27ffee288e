//! # Cman Server Library
//!
//! Authoritative server for the Cman maze chase. One player runs the maze
//! as Cman collecting points, a second hunts it as the Spirit, and any
//! number of watchers follow along. Clients only send intents; the server
//! owns the board, the roles and the match lifecycle.
//!
//! ## Match Lifecycle
//!
//! The server hosts a single match that cycles through two phases:
//!
//! - **Idle**: roles are being claimed. Every successful join is followed by
//!   a state sync to all registered endpoints.
//! - **Active**: entered once both Cman and Spirit are present, announced
//!   with a state broadcast whose freeze flag is 0. Moves from the two
//!   players are applied to the board and echoed to everyone.
//!
//! A match ends when the board reports a winner or a player quits while
//! Active (a forfeit). The result is broadcast ten times, one second apart,
//! then all roles are dropped and the board is reset in place.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Dispatch
//! A receive task forwards raw datagrams to one dispatch loop, which decodes
//! and applies them strictly one at a time. Outbound messages are queued to
//! a send task, so no game state is ever shared between tasks.
//!
//! ### UDP-Based Communication
//! One JSON object per datagram, tagged by an integer opcode. Delivery is
//! not guaranteed and nothing is retransmitted; a lost request simply never
//! reaches the match.
//!
//! ## Module Organization
//!
//! - `announce`: bounded, timer-paced game over broadcasts
//! - `broadcast`: fan-out of messages to registered endpoints
//! - `controller`: the match state machine
//! - `game`: the rules engine interface the controller depends on
//! - `maze`: the built-in grid implementation of that interface
//! - `network`: sockets, send/receive tasks and the dispatch loop
//! - `session`: role occupancy per endpoint
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::maze::{MazeGame, DEFAULT_LAYOUT};
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let game = MazeGame::from_layout(DEFAULT_LAYOUT)?;
//!     let mut server = Server::new(&ServerConfig::default(), game).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod announce;
pub mod broadcast;
pub mod controller;
pub mod game;
pub mod maze;
pub mod network;
pub mod session;
