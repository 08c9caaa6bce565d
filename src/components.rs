//! Value types shared by every part of the engine: directions, tile
//! coordinates and the closed set of things that can sit on a tile.

/// Draw priority of an occupant. Higher layers are painted last.
pub type Layer = u8;

pub const WALL_LAYER: Layer = 6;
pub const GATE_LAYER: Layer = 5;
pub const GHOST_LAYER: Layer = 4;
pub const PACMAN_LAYER: Layer = 3;
pub const FLEEING_GHOST_LAYER: Layer = 2;
pub const PELLET_LAYER: Layer = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
    Static,
}

/// Fixed iteration order used whenever a heading is picked. Ties between
/// candidate headings go to the earliest entry.
pub const CARDINALS: [Dir; 4] = [Dir::Up, Dir::Down, Dir::Left, Dir::Right];

impl Dir {
    /// Column and row delta, `(dx, dy)`.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Dir::Up => (0, -1),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
            Dir::Static => (0, 0),
        }
    }

    pub fn opposite(self) -> Dir {
        match self {
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
            Dir::Static => Dir::Static,
        }
    }

    /// `Static` is never the opposite of anything, itself included.
    pub fn is_opposite(self, other: Dir) -> bool {
        self != Dir::Static && other != Dir::Static && self.opposite() == other
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Dir::Up => 0,
            Dir::Down => 1,
            Dir::Left => 2,
            Dir::Right => 3,
            Dir::Static => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Dir {
        match code {
            0 => Dir::Up,
            1 => Dir::Down,
            2 => Dir::Left,
            3 => Dir::Right,
            _ => Dir::Static,
        }
    }
}

/// Tile coordinate. Rows grow downwards, columns grow to the right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Straight-line distance in tiles. Wrap-around is not taken into account.
    pub fn distance_to(self, other: Pos) -> f64 {
        let dr = self.row as f64 - other.row as f64;
        let dc = self.col as f64 - other.col as f64;
        dr.hypot(dc)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PelletKind {
    Normal,
    Power,
}

impl PelletKind {
    pub fn score(self) -> u32 {
        match self {
            PelletKind::Normal => 10,
            PelletKind::Power => 50,
        }
    }

    pub fn is_power(self) -> bool {
        self == PelletKind::Power
    }
}

/// Index of a ghost inside the level roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GhostId(pub usize);

/// Who is asking whether a tile can be entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mover {
    Pacman,
    Ghost,
}

/// Everything that can occupy a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Occupant {
    Wall,
    /// Ghost-pen gate. Closed for the player, open for ghosts.
    Gate,
    Pellet(PelletKind),
    Pacman,
    Ghost(GhostId),
}

impl Occupant {
    /// Walls and gates never move and are never removed.
    pub fn is_immovable(self) -> bool {
        matches!(self, Occupant::Wall | Occupant::Gate)
    }

    /// Occupants tracked by the grid's position index.
    pub fn is_mobile(self) -> bool {
        matches!(self, Occupant::Pacman | Occupant::Ghost(_))
    }

    pub fn blocks(self, mover: Mover) -> bool {
        match self {
            Occupant::Wall => true,
            Occupant::Gate => mover == Mover::Pacman,
            _ => false,
        }
    }

    /// Static draw layer. Ghosts report their frightened layer through the
    /// world, which knows their current state.
    pub fn layer(self) -> Layer {
        match self {
            Occupant::Wall => WALL_LAYER,
            Occupant::Gate => GATE_LAYER,
            Occupant::Ghost(_) => GHOST_LAYER,
            Occupant::Pacman => PACMAN_LAYER,
            Occupant::Pellet(_) => PELLET_LAYER,
        }
    }
}
