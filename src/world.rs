//! Shared state of a running level: the grid, the entities and the score.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};

use crate::audio::SoundPlayer;
use crate::broker::Outbox;
use crate::chase::GhostKind;
use crate::components::{Dir, GhostId, Layer, Occupant, PelletKind, Pos};
use crate::config::Tuning;
use crate::ghost::Ghost;
use crate::grid::Grid;
use crate::player::Pacman;

/// What a renderer should show for an occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sprite {
    Wall,
    Gate,
    Pellet(PelletKind),
    Pacman,
    Dying,
    Ghost(GhostKind),
    Frightened,
    Flickering,
    Eyes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Appearance {
    pub sprite: Sprite,
    pub facing: Dir,
    pub layer: Layer,
    pub frame: u32,
}

impl Appearance {
    pub fn fixed(sprite: Sprite, layer: Layer) -> Self {
        Self {
            sprite,
            facing: Dir::Static,
            layer,
            frame: 0,
        }
    }
}

pub struct World {
    grid: Mutex<Grid>,
    pacman: Arc<Pacman>,
    ghosts: Vec<Arc<Ghost>>,
    score: AtomicU32,
    sound: SoundPlayer,
    tuning: Tuning,
}

/// Everything an entity may touch while it ticks. The grid is already locked.
pub struct TickContext<'a> {
    pub grid: &'a mut Grid,
    pub world: &'a World,
    pub outbox: &'a mut Outbox,
    pub now: Instant,
}

impl World {
    pub fn new(
        grid: Grid,
        pacman: Arc<Pacman>,
        ghosts: Vec<Arc<Ghost>>,
        sound: SoundPlayer,
        tuning: Tuning,
    ) -> Self {
        Self {
            grid: Mutex::new(grid),
            pacman,
            ghosts,
            score: AtomicU32::new(0),
            sound,
            tuning,
        }
    }

    /// Locks the grid. Never call this while holding an entity's state.
    pub fn lock_grid(&self) -> MutexGuard<'_, Grid> {
        self.grid.lock()
    }

    pub fn pacman(&self) -> &Arc<Pacman> {
        &self.pacman
    }

    pub fn ghosts(&self) -> &[Arc<Ghost>] {
        &self.ghosts
    }

    pub fn ghost(&self, id: GhostId) -> Option<&Arc<Ghost>> {
        self.ghosts.get(id.0)
    }

    pub fn sound(&self) -> &SoundPlayer {
        &self.sound
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn score(&self) -> u32 {
        self.score.load(Ordering::Acquire)
    }

    /// Adds `points` and returns the new total.
    pub fn add_score(&self, points: u32) -> u32 {
        self.score.fetch_add(points, Ordering::AcqRel) + points
    }

    /// `(cols, rows)` of the grid.
    pub fn dimensions(&self) -> (usize, usize) {
        self.grid.lock().dimensions()
    }

    /// Draw priority of an occupant given the current entity states.
    pub fn layer_of(&self, occupant: Occupant) -> Layer {
        match occupant {
            Occupant::Ghost(id) => self
                .ghost(id)
                .map_or(occupant.layer(), |ghost| ghost.layer()),
            _ => occupant.layer(),
        }
    }

    pub fn appearance(&self, occupant: Occupant) -> Appearance {
        match occupant {
            Occupant::Wall => Appearance::fixed(Sprite::Wall, occupant.layer()),
            Occupant::Gate => Appearance::fixed(Sprite::Gate, occupant.layer()),
            Occupant::Pellet(kind) => Appearance::fixed(Sprite::Pellet(kind), occupant.layer()),
            Occupant::Pacman => self.pacman.appearance(),
            Occupant::Ghost(id) => match self.ghost(id) {
                Some(ghost) => ghost.appearance(),
                None => Appearance::fixed(Sprite::Eyes, occupant.layer()),
            },
        }
    }

    /// Reports every occupant of every tile, lowest layer first, under a
    /// single grid lock.
    pub fn draw<V>(&self, mut visitor: V)
    where
        V: FnMut(Pos, Appearance),
    {
        let grid = self.grid.lock();
        grid.draw(
            |occupant| self.layer_of(occupant),
            |pos, occupant| visitor(pos, self.appearance(occupant)),
        );
    }
}
