//! Role occupancy for the single match the server hosts
//!
//! This module tracks which transport endpoint holds each role:
//! - At most one Cman and at most one Spirit
//! - Any number of watchers, each address listed once
//! - The ordered history of every endpoint admitted since the last restart
//!
//! Endpoints have no identity beyond their address, so a datagram arriving
//! from a registered address is always treated as coming from the party that
//! holds it.

use log::info;
use shared::Role;
use std::net::SocketAddr;

/// Why a join request was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    /// The requested singleton role is held by another endpoint.
    RoleTaken(Role),
    /// The endpoint already plays a singleton role.
    AlreadyPlaying(Role),
}

/// Maps endpoints to roles and back.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    cman: Option<SocketAddr>,
    spirit: Option<SocketAddr>,
    watchers: Vec<SocketAddr>,
    /// Every endpoint admitted since the last restart, in arrival order
    admitted: Vec<SocketAddr>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `addr` under `role`
    ///
    /// Singleton roles are exclusive. An endpoint that already plays Cman or
    /// Spirit cannot take a second role. Joining as a watcher twice from the
    /// same address is accepted and leaves the watcher list unchanged. A
    /// watcher that claims a free player role is promoted.
    pub fn assign(&mut self, role: Role, addr: SocketAddr) -> Result<(), JoinRejection> {
        if let Some(held @ (Role::Cman | Role::Spirit)) = self.role_of(addr) {
            if held != role {
                return Err(JoinRejection::AlreadyPlaying(held));
            }
        }

        match role {
            Role::Cman | Role::Spirit => {
                let slot = if role == Role::Cman {
                    &mut self.cman
                } else {
                    &mut self.spirit
                };
                if slot.is_some() {
                    return Err(JoinRejection::RoleTaken(role));
                }
                *slot = Some(addr);
                self.watchers.retain(|w| *w != addr);
            }
            Role::Watcher => {
                if !self.watchers.contains(&addr) {
                    self.watchers.push(addr);
                }
            }
        }

        if !self.admitted.contains(&addr) {
            self.admitted.push(addr);
        }
        info!("{} joined as {}", addr, role);
        Ok(())
    }

    /// Removes `addr` from whichever role it holds and returns that role.
    /// The admission history keeps it until the next restart.
    pub fn remove(&mut self, addr: SocketAddr) -> Option<Role> {
        let role = self.role_of(addr)?;
        match role {
            Role::Cman => self.cman = None,
            Role::Spirit => self.spirit = None,
            Role::Watcher => self.watchers.retain(|w| *w != addr),
        }
        info!("{} left the {} role", addr, role);
        Some(role)
    }

    /// Looks up the role held by `addr`
    pub fn role_of(&self, addr: SocketAddr) -> Option<Role> {
        if self.cman == Some(addr) {
            Some(Role::Cman)
        } else if self.spirit == Some(addr) {
            Some(Role::Spirit)
        } else if self.watchers.contains(&addr) {
            Some(Role::Watcher)
        } else {
            None
        }
    }

    pub fn holder(&self, role: Role) -> Option<SocketAddr> {
        match role {
            Role::Cman => self.cman,
            Role::Spirit => self.spirit,
            Role::Watcher => None,
        }
    }

    /// True once both player roles are filled
    pub fn players_present(&self) -> bool {
        self.cman.is_some() && self.spirit.is_some()
    }

    /// Endpoints that receive broadcasts: Cman, Spirit, then watchers
    /// in join order. Vacant roles are skipped.
    pub fn recipients(&self) -> Vec<SocketAddr> {
        self.cman
            .iter()
            .chain(self.spirit.iter())
            .chain(self.watchers.iter())
            .copied()
            .collect()
    }

    pub fn watchers(&self) -> &[SocketAddr] {
        &self.watchers
    }

    pub fn admitted(&self) -> &[SocketAddr] {
        &self.admitted
    }

    /// Drops every role and the admission history
    pub fn clear(&mut self) {
        self.cman = None;
        self.spirit = None;
        self.watchers.clear();
        self.admitted.clear();
    }

    pub fn len(&self) -> usize {
        self.recipients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cman.is_none() && self.spirit.is_none() && self.watchers.is_empty()
    }
}
