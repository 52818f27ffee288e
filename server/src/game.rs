//! Interface between the match controller and the rules engine
//!
//! The controller never looks at the board. Everything it needs to admit
//! moves, build snapshots and detect the end of a match goes through
//! [`GameModel`].

use shared::{Coords, Direction, Role};

/// One of the two playing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    Cman,
    Spirit,
}

impl Player {
    /// 1-based index used in the `winner` field of the game over message.
    pub fn winner_index(self) -> u8 {
        match self {
            Player::Cman => 1,
            Player::Spirit => 2,
        }
    }

    pub fn opponent(self) -> Player {
        match self {
            Player::Cman => Player::Spirit,
            Player::Spirit => Player::Cman,
        }
    }

    /// Maps a session role to the side it plays, if any.
    pub fn from_role(role: Role) -> Option<Player> {
        match role {
            Role::Cman => Some(Player::Cman),
            Role::Spirit => Some(Player::Spirit),
            Role::Watcher => None,
        }
    }
}

/// Authoritative board and rules for a single match.
///
/// Implementations are mutated in place for the whole lifetime of the
/// server; [`GameModel::reset`] must bring the board, the score and the
/// attempt counter back to their initial values without forgetting the
/// layout.
pub trait GameModel {
    /// Starting cells of Cman and Spirit, in that order.
    fn start_coords(&self) -> [Coords; 2];

    fn max_attempts(&self) -> u32;

    /// Applies one step for `player`. Returns false and leaves the board
    /// untouched when the move is not legal.
    fn apply_move(&mut self, player: Player, direction: Direction) -> bool;

    fn coords(&self, player: Player) -> Coords;

    fn collected_count(&self) -> u32;

    /// Attempts Cman has left before the Spirit wins.
    fn attempts_left(&self) -> u32;

    fn winner(&self) -> Option<Player>;

    /// Ends the match in favour of `player` regardless of the board.
    fn declare_winner(&mut self, player: Player);

    fn reset(&mut self);
}
