//! Server network layer handling UDP communications and the dispatch loop

use crate::announce::{ScheduledAnnouncement, GAME_OVER_INTERVAL, GAME_OVER_REPEATS};
use crate::broadcast::{Broadcaster, Outgoing};
use crate::controller::MatchController;
use crate::game::GameModel;
use log::{debug, error, info, warn};
use shared::{ServerMessage, BUFFER_SIZE, DEFAULT_HOST, DEFAULT_PORT};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Startup settings for [`Server`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of game over broadcasts before the restart
    pub announce_repeats: u32,
    pub announce_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            announce_repeats: GAME_OVER_REPEATS,
            announce_interval: GAME_OVER_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Events sent from the receive task to the dispatch loop
#[derive(Debug)]
pub enum NetworkEvent {
    DatagramReceived { bytes: Vec<u8>, addr: SocketAddr },
}

/// Owns the socket and the match controller for the lifetime of the process
pub struct Server<G: GameModel> {
    socket: Arc<UdpSocket>,
    controller: MatchController<G>,

    event_tx: Option<mpsc::UnboundedSender<NetworkEvent>>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    outgoing_rx: Option<mpsc::UnboundedReceiver<Outgoing>>,
}

impl<G: GameModel> Server<G> {
    /// Binds the socket. This is the only fatal failure the server has.
    pub async fn new(config: &ServerConfig, game: G) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.bind_addr()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        let controller = MatchController::new(game, Broadcaster::new(outgoing_tx))
            .with_announcement(config.announce_repeats, config.announce_interval);

        Ok(Server {
            socket,
            controller,
            event_tx: Some(event_tx),
            event_rx,
            outgoing_rx: Some(outgoing_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(event_tx) = self.event_tx.take() else {
            return;
        };

        tokio::spawn(async move {
            let mut buffer = [0u8; BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let event = NetworkEvent::DatagramReceived {
                            bytes: buffer[..len].to_vec(),
                            addr,
                        };
                        if let Err(e) = event_tx.send(event) {
                            error!("Failed to send datagram to dispatch loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        // Includes ICMP port unreachable surfacing on some
                        // platforms after sending to a departed client.
                        warn!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that encodes and transmits the outgoing queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut outgoing_rx) = self.outgoing_rx.take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(Outgoing { addr, message }) = outgoing_rx.recv().await {
                if let Err(e) = send_message(&socket, &message, addr).await {
                    error!("Failed to send to {}: {}", addr, e);
                }
            }
        });
    }

    /// Main dispatch loop, runs until the receive task stops
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(std::future::pending()).await
    }

    /// Main dispatch loop, runs until `shutdown` completes
    ///
    /// Datagrams are handled one at a time in arrival order. While a game
    /// over announcement is running, inbound datagrams stay queued and are
    /// handled after the restart. Shutting down cancels a running
    /// announcement, so no further results go out.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        tokio::pin!(shutdown);

        let mut announcement: Option<ScheduledAnnouncement> = None;

        info!("Server started, waiting for players");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if let Some(schedule) = announcement.as_mut() {
                        info!(
                            "Cancelling game over announcement, {} broadcasts skipped",
                            schedule.remaining()
                        );
                        schedule.cancel();
                    }
                    info!("Server shutting down");
                    break;
                },

                event = self.event_rx.recv(), if announcement.is_none() => {
                    match event {
                        Some(NetworkEvent::DatagramReceived { bytes, addr }) => {
                            debug!("{} bytes from {}", bytes.len(), addr);
                            announcement = self
                                .controller
                                .handle_datagram(addr, &bytes)
                                .map(ScheduledAnnouncement::start);
                        }
                        None => {
                            error!("Receive task stopped, shutting down");
                            break;
                        }
                    }
                },

                step = next_announcement_step(&mut announcement) => {
                    match step {
                        Some(message) => self.controller.broadcast(&message),
                        None => {
                            announcement = None;
                            self.controller.restart();
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

async fn send_message(
    socket: &UdpSocket,
    message: &ServerMessage,
    addr: SocketAddr,
) -> std::io::Result<()> {
    let data = message.encode();
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Waits for the running announcement's next tick, or forever if none runs
async fn next_announcement_step(
    announcement: &mut Option<ScheduledAnnouncement>,
) -> Option<ServerMessage> {
    match announcement {
        Some(schedule) => schedule.tick().await,
        None => std::future::pending().await,
    }
}
