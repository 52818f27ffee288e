//! Repeated game over announcement
//!
//! When a match ends, the result is broadcast a fixed number of times at a
//! fixed interval before the server restarts. [`GameOverAnnouncement`] holds
//! the bounded repetition state and [`ScheduledAnnouncement`] paces it on a
//! tokio interval. The dispatch loop polls the schedule alongside inbound
//! traffic, so the announcement never needs its own task.

use shared::{GameOverReport, ServerMessage};
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

pub const GAME_OVER_REPEATS: u32 = 10;
pub const GAME_OVER_INTERVAL: Duration = Duration::from_secs(1);
/// Shortest pause between broadcasts; a zero period cannot drive a timer
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOverAnnouncement {
    message: ServerMessage,
    remaining: u32,
    interval: Duration,
}

impl GameOverAnnouncement {
    pub fn new(report: GameOverReport, repeats: u32, interval: Duration) -> Self {
        Self {
            message: ServerMessage::GameOver(report),
            remaining: repeats,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn message(&self) -> &ServerMessage {
        &self.message
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Message for the next broadcast, or None once every repetition is spent
    pub fn next_broadcast(&mut self) -> Option<ServerMessage> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.message.clone())
    }

    /// Skips the remaining repetitions. The restart still follows.
    pub fn cancel(&mut self) {
        self.remaining = 0;
    }
}

/// A [`GameOverAnnouncement`] paced by a timer
///
/// The first tick completes immediately, so `n` repetitions are broadcast
/// at `0, 1, .., n-1` intervals and the schedule reports completion one
/// interval after the last broadcast.
#[derive(Debug)]
pub struct ScheduledAnnouncement {
    announcement: GameOverAnnouncement,
    ticker: Interval,
}

impl ScheduledAnnouncement {
    pub fn start(announcement: GameOverAnnouncement) -> Self {
        let mut ticker = interval(announcement.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            announcement,
            ticker,
        }
    }

    /// Waits for the next tick. Returns the message to broadcast, or None
    /// when the announcement is over and the match should restart.
    pub async fn tick(&mut self) -> Option<ServerMessage> {
        self.ticker.tick().await;
        self.announcement.next_broadcast()
    }

    pub fn cancel(&mut self) {
        self.announcement.cancel();
    }

    pub fn remaining(&self) -> u32 {
        self.announcement.remaining()
    }
}
