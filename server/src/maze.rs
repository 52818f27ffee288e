//! Built-in maze rules engine
//!
//! A small grid-based implementation of [`GameModel`] so the server runs on
//! its own. Layouts are ASCII art, one row per line:
//!
//! - `#` wall
//! - `.` collectible point
//! - ` ` open floor
//! - `C` / `S` starting cell of Cman / Spirit (open floor, no point)
//!
//! Cman wins by collecting every point. The Spirit wins by catching Cman
//! `MAX_ATTEMPTS` times; each catch sends both players back to their start.

use crate::game::{GameModel, Player};
use log::{debug, info};
use shared::{Coords, Direction};
use std::collections::HashSet;
use std::fmt;

pub const MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_LAYOUT: &str = "\
###########
#C........#
#.###.###.#
#.#.....#.#
#.#.###.#.#
#....S....#
###########";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MazeError {
    Empty,
    RaggedRow { row: usize },
    UnknownTile { tile: char, row: usize, col: usize },
    MissingStart(char),
    DuplicateStart(char),
}

impl fmt::Display for MazeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MazeError::Empty => write!(f, "layout has no rows"),
            MazeError::RaggedRow { row } => {
                write!(f, "row {} differs in width from the first row", row)
            }
            MazeError::UnknownTile { tile, row, col } => {
                write!(f, "unknown tile {:?} at row {}, column {}", tile, row, col)
            }
            MazeError::MissingStart(tile) => write!(f, "layout has no {:?} start cell", tile),
            MazeError::DuplicateStart(tile) => {
                write!(f, "layout has more than one {:?} start cell", tile)
            }
        }
    }
}

impl std::error::Error for MazeError {}

#[derive(Debug, Clone)]
pub struct MazeGame {
    walls: Vec<Vec<bool>>,
    starts: [Coords; 2],
    initial_points: HashSet<Coords>,

    points: HashSet<Coords>,
    positions: [Coords; 2],
    collected: u32,
    attempts_left: u32,
    winner: Option<Player>,
}

impl MazeGame {
    /// Parses an ASCII layout. See the module docs for the tile set.
    pub fn from_layout(layout: &str) -> Result<Self, MazeError> {
        let rows: Vec<&str> = layout.lines().collect();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 {
            return Err(MazeError::Empty);
        }

        let mut walls = Vec::with_capacity(rows.len());
        let mut points = HashSet::new();
        let mut cman = None;
        let mut spirit = None;

        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != width {
                return Err(MazeError::RaggedRow { row });
            }

            let mut wall_row = Vec::with_capacity(width);
            for (col, tile) in line.chars().enumerate() {
                let coords = (col as u32, row as u32);
                match tile {
                    '#' => wall_row.push(true),
                    '.' => {
                        points.insert(coords);
                        wall_row.push(false);
                    }
                    ' ' => wall_row.push(false),
                    'C' | 'S' => {
                        let slot = if tile == 'C' { &mut cman } else { &mut spirit };
                        if slot.replace(coords).is_some() {
                            return Err(MazeError::DuplicateStart(tile));
                        }
                        wall_row.push(false);
                    }
                    _ => return Err(MazeError::UnknownTile { tile, row, col }),
                }
            }
            walls.push(wall_row);
        }

        let cman = cman.ok_or(MazeError::MissingStart('C'))?;
        let spirit = spirit.ok_or(MazeError::MissingStart('S'))?;

        info!(
            "Loaded {}x{} maze with {} points",
            width,
            walls.len(),
            points.len()
        );

        Ok(Self {
            walls,
            starts: [cman, spirit],
            initial_points: points.clone(),
            points,
            positions: [cman, spirit],
            collected: 0,
            attempts_left: MAX_ATTEMPTS,
            winner: None,
        })
    }

    pub fn points_left(&self) -> usize {
        self.points.len()
    }

    fn slot(player: Player) -> usize {
        match player {
            Player::Cman => 0,
            Player::Spirit => 1,
        }
    }

    fn is_open(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        self.walls
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .map(|wall| !wall)
            .unwrap_or(false)
    }

    fn resolve_catch(&mut self) {
        if self.positions[0] != self.positions[1] {
            return;
        }

        self.attempts_left = self.attempts_left.saturating_sub(1);
        debug!("Cman caught, {} attempts left", self.attempts_left);

        if self.attempts_left == 0 {
            self.winner = Some(Player::Spirit);
        } else {
            self.positions = self.starts;
        }
    }
}

impl GameModel for MazeGame {
    fn start_coords(&self) -> [Coords; 2] {
        self.starts
    }

    fn max_attempts(&self) -> u32 {
        MAX_ATTEMPTS
    }

    fn apply_move(&mut self, player: Player, direction: Direction) -> bool {
        if self.winner.is_some() {
            return false;
        }

        let (x, y) = self.positions[Self::slot(player)];
        let (dx, dy) = direction.delta();
        let (nx, ny) = (x as i64 + dx, y as i64 + dy);
        if !self.is_open(nx, ny) {
            return false;
        }

        let target = (nx as u32, ny as u32);
        self.positions[Self::slot(player)] = target;

        if player == Player::Cman && self.points.remove(&target) {
            self.collected += 1;
        }

        self.resolve_catch();

        if self.winner.is_none() && self.points.is_empty() {
            self.winner = Some(Player::Cman);
        }

        true
    }

    fn coords(&self, player: Player) -> Coords {
        self.positions[Self::slot(player)]
    }

    fn collected_count(&self) -> u32 {
        self.collected
    }

    fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    fn winner(&self) -> Option<Player> {
        self.winner
    }

    fn declare_winner(&mut self, player: Player) {
        self.winner = Some(player);
    }

    fn reset(&mut self) {
        self.points = self.initial_points.clone();
        self.positions = self.starts;
        self.collected = 0;
        self.attempts_left = MAX_ATTEMPTS;
        self.winner = None;
    }
}
