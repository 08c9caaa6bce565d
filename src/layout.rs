//! Text level format, one character per tile.
//!
//! ```text
//! #        wall
//! B P I C  wall that also marks the scatter corner of one ghost kind
//! |        ghost pen gate
//! .  @     pellet, power pellet
//! S        player spawn
//! G        ghost pen, where every ghost spawns and returns to
//! ```
//!
//! Anything else is an empty tile. All rows must have the same length.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::chase::GhostKind;
use crate::components::{Occupant, PelletKind, Pos};
use crate::error::{LevelError, LevelResult};
use crate::grid::Grid;

/// A parsed level: static occupants on the grid plus the spawn points the
/// level places its entities on.
#[derive(Debug)]
pub struct Layout {
    pub grid: Grid,
    pub player_spawn: Pos,
    pub ghost_home: Pos,
    pub corners: HashMap<GhostKind, Pos>,
}

impl Layout {
    pub fn load(path: impl AsRef<Path>) -> LevelResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layout = Self::parse(&text)?;
        let (cols, rows) = layout.grid.dimensions();
        info!(path = %path.display(), cols, rows, "level loaded");
        Ok(layout)
    }

    pub fn parse(text: &str) -> LevelResult<Self> {
        let mut grid = Grid::new();
        let mut player_spawn: Option<Pos> = None;
        let mut ghost_home: Option<Pos> = None;
        let mut corners = HashMap::new();

        for (row, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            let tiles: Vec<char> = line.chars().collect();
            grid.add_row(tiles.len())?;
            for (col, symbol) in tiles.into_iter().enumerate() {
                let here = Pos::new(row, col);
                match symbol {
                    '#' | 'B' | 'P' | 'I' | 'C' => {
                        if let Some(kind) = corner_kind(symbol) {
                            corners.insert(kind, here);
                        }
                        grid.add_occupant(row, col, Occupant::Wall)?;
                    }
                    '|' => grid.add_occupant(row, col, Occupant::Gate)?,
                    '.' => grid.add_occupant(row, col, Occupant::Pellet(PelletKind::Normal))?,
                    '@' => grid.add_occupant(row, col, Occupant::Pellet(PelletKind::Power))?,
                    'S' => {
                        if let Some(first) = player_spawn {
                            return Err(LevelError::DuplicatePlayer { first, second: here });
                        }
                        player_spawn = Some(here);
                    }
                    'G' => {
                        if let Some(first) = ghost_home {
                            return Err(LevelError::DuplicateGhostSpawn { first, second: here });
                        }
                        ghost_home = Some(here);
                    }
                    _ => {}
                }
            }
        }

        Ok(Self {
            grid,
            player_spawn: player_spawn.ok_or(LevelError::MissingPlayer)?,
            ghost_home: ghost_home.ok_or(LevelError::MissingGhostSpawn)?,
            corners,
        })
    }
}

fn corner_kind(symbol: char) -> Option<GhostKind> {
    match symbol {
        'B' => Some(GhostKind::Blinky),
        'P' => Some(GhostKind::Pinky),
        'I' => Some(GhostKind::Inky),
        'C' => Some(GhostKind::Clyde),
        _ => None,
    }
}
