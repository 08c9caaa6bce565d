//! Toroidal tile grid with per-tile occupant stacks.
//!
//! The grid is the single source of truth for where movable occupants are:
//! stacks and the position index are edited together by the same calls, so
//! an entity's position cannot drift away from the stack that holds it.

use std::collections::HashMap;

use tracing::warn;

use crate::components::{Dir, Layer, Mover, Occupant, PelletKind, Pos};
use crate::error::GridError;

/// Occupants sharing a single tile, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileStack {
    items: Vec<Occupant>,
}

impl TileStack {
    pub fn push(&mut self, occupant: Occupant) {
        self.items.push(occupant);
    }

    /// Removes the first entry equal to `occupant`.
    pub fn remove(&mut self, occupant: Occupant) -> bool {
        match self.items.iter().position(|o| *o == occupant) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Removes the first pellet on the tile, if any.
    pub fn take_pellet(&mut self) -> Option<PelletKind> {
        let idx = self
            .items
            .iter()
            .position(|o| matches!(o, Occupant::Pellet(_)))?;
        match self.items.remove(idx) {
            Occupant::Pellet(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> &[Occupant] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occupant> {
        self.items.iter()
    }

    pub fn contains(&self, occupant: Occupant) -> bool {
        self.items.contains(&occupant)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when any occupant on the tile blocks `mover`.
    pub fn blocks(&self, mover: Mover) -> bool {
        self.items.iter().any(|o| o.blocks(mover))
    }

    /// Occupants sorted by ascending layer. Equal layers keep insertion order.
    pub fn layered<F>(&self, layer_of: F) -> Vec<Occupant>
    where
        F: Fn(Occupant) -> Layer,
    {
        let mut sorted = self.items.clone();
        sorted.sort_by_key(|o| layer_of(*o));
        sorted
    }

    /// The occupant that would be drawn on top.
    pub fn top<F>(&self, layer_of: F) -> Option<Occupant>
    where
        F: Fn(Occupant) -> Layer,
    {
        self.layered(layer_of).pop()
    }
}

#[derive(Debug, Default)]
pub struct Grid {
    rows: usize,
    cols: usize,
    tiles: Vec<TileStack>,
    index: HashMap<Occupant, Pos>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// A grid of `rows` x `cols` empty tiles.
    pub fn with_size(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            tiles: vec![TileStack::default(); rows * cols],
            index: HashMap::new(),
        }
    }

    /// `(cols, rows)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn add_row(&mut self, cols: usize) -> Result<(), GridError> {
        if self.rows > 0 && self.cols != cols {
            return Err(GridError::RaggedRow {
                row: self.rows,
                expected: self.cols,
                found: cols,
            });
        }
        self.cols = cols;
        self.tiles
            .extend(std::iter::repeat_with(TileStack::default).take(cols));
        self.rows += 1;
        Ok(())
    }

    pub fn add_occupant(
        &mut self,
        row: usize,
        col: usize,
        occupant: Occupant,
    ) -> Result<(), GridError> {
        let idx = self.tile_index(row, col).ok_or(GridError::OutOfBounds {
            row,
            col,
            rows: self.rows,
            cols: self.cols,
        })?;
        if occupant.is_mobile() {
            if let Some(old) = self.index.get(&occupant).copied() {
                warn!(?occupant, ?old, "occupant placed twice, relocating");
                let old_idx = self.flat(old);
                self.tiles[old_idx].remove(occupant);
            }
            self.index.insert(occupant, Pos::new(row, col));
        }
        self.tiles[idx].push(occupant);
        Ok(())
    }

    /// `None` when the coordinate lies outside the grid.
    pub fn occupants_at(&self, row: usize, col: usize) -> Option<&TileStack> {
        self.tile_index(row, col).map(|idx| &self.tiles[idx])
    }

    /// The tile one step from `pos` in `dir`, wrapping around the edges.
    pub fn step(&self, pos: Pos, dir: Dir) -> Pos {
        self.offset(pos, dir, 1)
    }

    /// The tile `distance` steps from `pos` in `dir`, wrapping around the edges.
    pub fn offset(&self, pos: Pos, dir: Dir, distance: isize) -> Pos {
        if self.rows == 0 || self.cols == 0 {
            return pos;
        }
        let (dx, dy) = dir.delta();
        let row = (pos.row as isize + dy * distance).rem_euclid(self.rows as isize);
        let col = (pos.col as isize + dx * distance).rem_euclid(self.cols as isize);
        Pos::new(row as usize, col as usize)
    }

    pub fn position(&self, occupant: Occupant) -> Option<Pos> {
        self.index.get(&occupant).copied()
    }

    /// Moves a mobile occupant one tile in `dir` without checking what is
    /// there. Returns the new position, or `None` when the occupant could not
    /// be found where the index says it is.
    pub fn move_entity(&mut self, occupant: Occupant, dir: Dir) -> Option<Pos> {
        let Some(from) = self.index.get(&occupant).copied() else {
            warn!(?occupant, "cannot move an occupant that is not on the grid");
            return None;
        };
        let from_idx = self.flat(from);
        if !self.tiles[from_idx].remove(occupant) {
            warn!(?occupant, ?from, "occupant missing from its tile, move skipped");
            return None;
        }
        let to = self.step(from, dir);
        let to_idx = self.flat(to);
        self.tiles[to_idx].push(occupant);
        self.index.insert(occupant, to);
        Some(to)
    }

    /// Takes a mobile occupant off the grid entirely.
    pub fn remove_entity(&mut self, occupant: Occupant) -> Option<Pos> {
        let pos = self.index.remove(&occupant)?;
        let idx = self.flat(pos);
        if !self.tiles[idx].remove(occupant) {
            warn!(?occupant, ?pos, "occupant missing from its tile on removal");
        }
        Some(pos)
    }

    /// Consumes a pellet on `pos`. A second call for the same pellet finds nothing.
    pub fn remove_pellet(&mut self, pos: Pos) -> Option<PelletKind> {
        let idx = self.tile_index(pos.row, pos.col)?;
        self.tiles[idx].take_pellet()
    }

    pub fn pellet_count(&self) -> usize {
        self.tiles
            .iter()
            .flat_map(|stack| stack.iter())
            .filter(|o| matches!(o, Occupant::Pellet(_)))
            .count()
    }

    /// Every tile holding `occupant`. Scans the stacks rather than the index,
    /// so it can be used to check that both agree.
    pub fn find_all(&self, occupant: Occupant) -> Vec<Pos> {
        let mut found = Vec::new();
        for (idx, stack) in self.tiles.iter().enumerate() {
            for _ in stack.iter().filter(|o| **o == occupant) {
                found.push(Pos::new(idx / self.cols, idx % self.cols));
            }
        }
        found
    }

    /// Visits every occupant of every tile, lowest layer first.
    pub fn draw<L, V>(&self, layer_of: L, mut visitor: V)
    where
        L: Fn(Occupant) -> Layer,
        V: FnMut(Pos, Occupant),
    {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let stack = &self.tiles[row * self.cols + col];
                for occupant in stack.layered(&layer_of) {
                    visitor(Pos::new(row, col), occupant);
                }
            }
        }
    }

    fn tile_index(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(row * self.cols + col)
    }

    fn flat(&self, pos: Pos) -> usize {
        pos.row * self.cols + pos.col
    }
}
