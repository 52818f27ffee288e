//! Fan-out of server messages to registered endpoints
//!
//! The broadcaster does not touch the socket. It queues one [`Outgoing`]
//! per recipient on a channel drained by the network send task, so the
//! match controller stays synchronous.

use crate::session::SessionRegistry;
use log::{debug, error};
use shared::ServerMessage;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A message addressed to a single endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub addr: SocketAddr,
    pub message: ServerMessage,
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Broadcaster {
    pub fn new(tx: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { tx }
    }

    /// Queues `message` for `addr` whether or not it holds a role
    pub fn send(&self, addr: SocketAddr, message: ServerMessage) {
        if let Err(e) = self.tx.send(Outgoing { addr, message }) {
            error!("Failed to queue message for {}: {}", addr, e);
        }
    }

    /// Queues `message` for every endpoint currently holding a role
    pub fn broadcast(&self, registry: &SessionRegistry, message: &ServerMessage) {
        let recipients = registry.recipients();
        debug!(
            "Broadcasting opcode 0x{:02x} to {} endpoints",
            message.opcode(),
            recipients.len()
        );
        for addr in recipients {
            self.send(addr, message.clone());
        }
    }
}
