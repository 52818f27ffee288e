//! Integration tests running the real server over loopback UDP
//!
//! Each test binds its own server on an ephemeral port and talks to it with
//! plain UDP sockets, exactly as a client process would.

use server::maze::{MazeGame, DEFAULT_LAYOUT};
use server::network::{Server, ServerConfig};
use shared::{ClientMessage, Direction, GameStateUpdate, Role, ServerMessage, BUFFER_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_test::assert_ok;

const ANNOUNCE_REPEATS: u32 = 3;
const ANNOUNCE_INTERVAL: Duration = Duration::from_millis(50);

fn test_config(announce_interval: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        announce_repeats: ANNOUNCE_REPEATS,
        announce_interval,
    }
}

/// Starts a server on an ephemeral port and returns its address
async fn spawn_server() -> SocketAddr {
    let game = MazeGame::from_layout(DEFAULT_LAYOUT).unwrap();
    let mut server = Server::new(&test_config(ANNOUNCE_INTERVAL), game)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

struct TestClient {
    socket: UdpSocket,
    server: SocketAddr,
}

impl TestClient {
    async fn connect(server: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self { socket, server }
    }

    async fn send(&self, message: ClientMessage) {
        self.send_raw(&message.encode()).await;
    }

    async fn send_raw(&self, bytes: &[u8]) {
        assert_ok!(self.socket.send_to(bytes, self.server).await);
    }

    async fn recv(&self) -> ServerMessage {
        let mut buf = [0u8; BUFFER_SIZE];
        let (len, from) = timeout(Duration::from_secs(2), self.socket.recv_from(&mut buf))
            .await
            .expect("Timed out waiting for the server")
            .unwrap();
        assert_eq!(from, self.server);
        ServerMessage::decode(&buf[..len]).unwrap()
    }

    async fn recv_state(&self) -> GameStateUpdate {
        match self.recv().await {
            ServerMessage::GameState(state) => state,
            other => panic!("Expected a game state, got {:?}", other),
        }
    }

    /// Asserts that nothing arrives within a short window
    async fn assert_silent(&self) {
        let mut buf = [0u8; BUFFER_SIZE];
        let result = timeout(Duration::from_millis(100), self.socket.recv_from(&mut buf)).await;
        assert!(result.is_err(), "Unexpected datagram from the server");
    }
}

/// PROTOCOL ERROR TESTS
mod protocol_tests {
    use super::*;

    #[tokio::test]
    async fn malformed_datagrams_get_error_replies() {
        let server = spawn_server().await;
        let client = TestClient::connect(server).await;

        client.send_raw(b"definitely not json").await;
        assert_eq!(
            client.recv().await,
            ServerMessage::Error("Malformed message.".to_string())
        );

        client.send_raw(br#"{"opcode": 42}"#).await;
        assert_eq!(
            client.recv().await,
            ServerMessage::Error("Invalid OPCODE".to_string())
        );

        client.send_raw(br#"{"opcode": 0, "role": 5}"#).await;
        assert_eq!(
            client.recv().await,
            ServerMessage::Error("Role already taken or invalid.".to_string())
        );

        // The server keeps serving after bad input.
        client.send(ClientMessage::Join { role: Role::Watcher }).await;
        assert_eq!(client.recv_state().await.freeze, 1);
    }

    #[tokio::test]
    async fn unknown_quitter_gets_error_and_confirmation() {
        let server = spawn_server().await;
        let client = TestClient::connect(server).await;

        client.send(ClientMessage::Quit).await;

        assert_eq!(
            client.recv().await,
            ServerMessage::Error("Unknown client.".to_string())
        );
        assert_eq!(
            client.recv().await,
            ServerMessage::Notice("Quit confirmed".to_string())
        );
    }
}

/// MATCH FLOW TESTS
mod match_tests {
    use super::*;

    #[tokio::test]
    async fn join_start_and_move_end_to_end() {
        let server = spawn_server().await;
        let cman = TestClient::connect(server).await;
        let spirit = TestClient::connect(server).await;

        cman.send(ClientMessage::Join { role: Role::Cman }).await;
        let sync = cman.recv_state().await;
        assert_eq!(sync.freeze, 1);
        assert_eq!(sync.c_coords, (1, 1));
        assert_eq!(sync.s_coords, (5, 5));
        assert_eq!(sync.attempts, 3);

        spirit.send(ClientMessage::Join { role: Role::Spirit }).await;
        for client in [&cman, &spirit] {
            assert_eq!(client.recv_state().await.freeze, 1);
            assert_eq!(client.recv_state().await.freeze, 0);
        }

        cman.send(ClientMessage::Move {
            direction: Direction::Right,
        })
        .await;
        for client in [&cman, &spirit] {
            let update = client.recv_state().await;
            assert_eq!(update.freeze, 1);
            assert_eq!(update.c_coords, (2, 1));
            assert_eq!(update.s_coords, (5, 5));
            assert_eq!(update.collected, 1);
        }

        // Walking into the outer wall is refused and only the mover hears.
        cman.send(ClientMessage::Move {
            direction: Direction::Up,
        })
        .await;
        assert_eq!(
            cman.recv().await,
            ServerMessage::Error("Invalid move.".to_string())
        );
        spirit.assert_silent().await;
    }

    #[tokio::test]
    async fn second_cman_is_rejected() {
        let server = spawn_server().await;
        let first = TestClient::connect(server).await;
        let second = TestClient::connect(server).await;

        first.send(ClientMessage::Join { role: Role::Cman }).await;
        first.recv_state().await;

        second.send(ClientMessage::Join { role: Role::Cman }).await;
        assert_eq!(
            second.recv().await,
            ServerMessage::Error("Role already taken or invalid.".to_string())
        );
        first.assert_silent().await;
    }

    #[tokio::test]
    async fn forfeit_announces_then_restarts() {
        let server = spawn_server().await;
        let cman = TestClient::connect(server).await;
        let spirit = TestClient::connect(server).await;
        let watcher = TestClient::connect(server).await;
        let newcomer = TestClient::connect(server).await;

        cman.send(ClientMessage::Join { role: Role::Cman }).await;
        cman.recv_state().await;
        spirit.send(ClientMessage::Join { role: Role::Spirit }).await;
        for client in [&cman, &spirit] {
            client.recv_state().await;
        }
        cman.recv_state().await;
        spirit.recv_state().await;
        watcher.send(ClientMessage::Join { role: Role::Watcher }).await;
        for client in [&cman, &spirit, &watcher] {
            assert_eq!(client.recv_state().await.freeze, 1);
        }

        cman.send(ClientMessage::Quit).await;
        // Sent while the result is being announced: only handled after the
        // restart, when the Spirit role is free again.
        newcomer.send(ClientMessage::Join { role: Role::Spirit }).await;

        assert_eq!(
            cman.recv().await,
            ServerMessage::Notice("Quit confirmed".to_string())
        );
        for client in [&spirit, &watcher] {
            for _ in 0..ANNOUNCE_REPEATS {
                match client.recv().await {
                    ServerMessage::GameOver(report) => {
                        assert_eq!(report.winner, 2);
                        assert_eq!(report.s_score, 0);
                        assert_eq!(report.c_score, 0);
                    }
                    other => panic!("Expected game over, got {:?}", other),
                }
            }
        }

        let sync = newcomer.recv_state().await;
        assert_eq!(sync.freeze, 1);
        assert_eq!(sync.collected, 0);

        // The old roster was dropped by the restart.
        spirit.assert_silent().await;
        watcher.assert_silent().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_running_announcement() {
        let game = MazeGame::from_layout(DEFAULT_LAYOUT).unwrap();
        let mut server = Server::new(&test_config(Duration::from_millis(500)), game)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .run_until(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .is_ok()
        });

        let cman = TestClient::connect(addr).await;
        let spirit = TestClient::connect(addr).await;
        cman.send(ClientMessage::Join { role: Role::Cman }).await;
        cman.recv_state().await;
        spirit.send(ClientMessage::Join { role: Role::Spirit }).await;
        for _ in 0..2 {
            cman.recv_state().await;
            spirit.recv_state().await;
        }

        spirit.send(ClientMessage::Quit).await;
        spirit.recv().await;
        assert!(matches!(cman.recv().await, ServerMessage::GameOver(_)));

        shutdown_tx.send(()).unwrap();
        let stopped = timeout(Duration::from_secs(2), handle)
            .await
            .expect("Server did not stop")
            .unwrap();
        assert!(stopped);

        // The remaining repetitions were cancelled.
        cman.assert_silent().await;
    }
}
