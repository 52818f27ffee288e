//! Match state machine
//!
//! The controller owns the session registry, the game model and the match
//! phase. It turns each decoded client message into registry and board
//! updates plus outbound messages queued on the [`Broadcaster`]. Every
//! rejected request is answered with an Error to its sender only and leaves
//! all state untouched.
//!
//! Ending a match does not block here: the controller hands back a
//! [`GameOverAnnouncement`] and the caller paces the broadcasts, then calls
//! [`MatchController::restart`].

use crate::announce::{GameOverAnnouncement, GAME_OVER_INTERVAL, GAME_OVER_REPEATS};
use crate::broadcast::Broadcaster;
use crate::game::{GameModel, Player};
use crate::session::SessionRegistry;
use log::{debug, info, warn};
use shared::{ClientMessage, Direction, GameOverReport, GameStateUpdate, Role, ServerMessage};
use std::net::SocketAddr;
use std::time::Duration;

pub const ROLE_TAKEN: &str = "Role already taken or invalid.";
pub const NOT_A_PLAYER: &str = "You are not a player.";
pub const INVALID_MOVE: &str = "Invalid move.";
pub const UNKNOWN_CLIENT: &str = "Unknown client.";
pub const QUIT_CONFIRMED: &str = "Quit confirmed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// Waiting for both players, or a match just ended
    Idle,
    /// Both players present, moves accepted
    Active,
}

pub struct MatchController<G: GameModel> {
    registry: SessionRegistry,
    game: G,
    state: MatchState,
    broadcaster: Broadcaster,
    announce_repeats: u32,
    announce_interval: Duration,
}

impl<G: GameModel> MatchController<G> {
    pub fn new(game: G, broadcaster: Broadcaster) -> Self {
        Self {
            registry: SessionRegistry::new(),
            game,
            state: MatchState::Idle,
            broadcaster,
            announce_repeats: GAME_OVER_REPEATS,
            announce_interval: GAME_OVER_INTERVAL,
        }
    }

    /// Overrides how often and how many times the result is announced
    pub fn with_announcement(mut self, repeats: u32, interval: Duration) -> Self {
        self.announce_repeats = repeats;
        self.announce_interval = interval;
        self
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    /// Decodes and handles one inbound datagram.
    ///
    /// Undecodable input is answered with an Error naming the problem.
    pub fn handle_datagram(
        &mut self,
        addr: SocketAddr,
        bytes: &[u8],
    ) -> Option<GameOverAnnouncement> {
        match ClientMessage::decode(bytes) {
            Ok(message) => self.handle_message(addr, message),
            Err(e) => {
                warn!("Rejected datagram from {}: {}", addr, e);
                self.reject(addr, e.reply_text());
                None
            }
        }
    }

    /// Applies one client message. Returns the announcement to run when the
    /// message ended the match.
    pub fn handle_message(
        &mut self,
        addr: SocketAddr,
        message: ClientMessage,
    ) -> Option<GameOverAnnouncement> {
        match message {
            ClientMessage::Join { role } => {
                self.handle_join(addr, role);
                None
            }
            ClientMessage::Move { direction } => self.handle_move(addr, direction),
            ClientMessage::Quit => self.handle_quit(addr),
        }
    }

    fn handle_join(&mut self, addr: SocketAddr, role: Role) {
        if let Err(rejection) = self.registry.assign(role, addr) {
            warn!("Join as {} from {} rejected: {:?}", role, addr, rejection);
            self.reject(addr, ROLE_TAKEN);
            return;
        }

        self.broadcast(&self.snapshot(1));

        if self.state == MatchState::Idle && self.registry.players_present() {
            self.state = MatchState::Active;
            info!(
                "Match started: cman {:?}, spirit {:?}",
                self.registry.holder(Role::Cman),
                self.registry.holder(Role::Spirit)
            );
            self.broadcast(&self.snapshot(0));
        }
    }

    fn handle_move(
        &mut self,
        addr: SocketAddr,
        direction: Direction,
    ) -> Option<GameOverAnnouncement> {
        let player = self.registry.role_of(addr).and_then(Player::from_role);
        let Some(player) = player.filter(|_| self.state == MatchState::Active) else {
            self.reject(addr, NOT_A_PLAYER);
            return None;
        };

        if !self.game.apply_move(player, direction) {
            debug!("{:?} move {:?} refused by the board", player, direction);
            self.reject(addr, INVALID_MOVE);
            return None;
        }

        debug!(
            "{:?} moved {:?} to {:?}",
            player,
            direction,
            self.game.coords(player)
        );

        match self.game.winner() {
            None => {
                self.broadcast(&self.snapshot(1));
                None
            }
            Some(winner) => Some(self.finish(winner)),
        }
    }

    fn handle_quit(&mut self, addr: SocketAddr) -> Option<GameOverAnnouncement> {
        // Forfeits are attributed from the role held before removal.
        let role = self.registry.remove(addr);
        if role.is_none() {
            self.reject(addr, UNKNOWN_CLIENT);
        }
        self.broadcaster
            .send(addr, ServerMessage::Notice(QUIT_CONFIRMED.to_string()));

        let quitter = role.and_then(Player::from_role);
        match (self.state, quitter) {
            (MatchState::Active, Some(player)) => {
                info!("{:?} at {} forfeits the match", player, addr);
                let winner = player.opponent();
                self.game.declare_winner(winner);
                Some(self.finish(winner))
            }
            _ => {
                let notice = format!("Player or Watcher at {} has left the game.", addr);
                self.broadcast(&ServerMessage::Notice(notice));
                None
            }
        }
    }

    /// Builds the result message for `winner` from the final board
    fn finish(&self, winner: Player) -> GameOverAnnouncement {
        let report = GameOverReport {
            winner: winner.winner_index(),
            s_score: self
                .game
                .max_attempts()
                .saturating_sub(self.game.attempts_left()),
            c_score: self.game.collected_count(),
        };
        info!(
            "Game over: {:?} wins (spirit {}, cman {})",
            winner, report.s_score, report.c_score
        );
        GameOverAnnouncement::new(report, self.announce_repeats, self.announce_interval)
    }

    /// Broadcasts `message` to every registered endpoint
    pub fn broadcast(&self, message: &ServerMessage) {
        self.broadcaster.broadcast(&self.registry, message);
    }

    /// Clears every role, resets the board in place and returns to Idle
    pub fn restart(&mut self) {
        info!(
            "Restarting match, dropping {} admitted endpoints",
            self.registry.admitted().len()
        );
        self.registry.clear();
        self.game.reset();
        self.state = MatchState::Idle;
    }

    fn snapshot(&self, freeze: u8) -> ServerMessage {
        ServerMessage::GameState(GameStateUpdate {
            freeze,
            c_coords: self.game.coords(Player::Cman),
            s_coords: self.game.coords(Player::Spirit),
            collected: self.game.collected_count(),
            attempts: self.game.attempts_left(),
        })
    }

    fn reject(&self, addr: SocketAddr, reason: &str) {
        self.broadcaster
            .send(addr, ServerMessage::Error(reason.to_string()));
    }
}
