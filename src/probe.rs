use crate::components::{Dir, Mover, Occupant, Pos, CARDINALS};
use crate::grid::Grid;

/// Read-only collision queries for one mobile occupant.
pub struct Probe<'a> {
    grid: &'a Grid,
    origin: Pos,
    facing: Dir,
    mover: Mover,
}

impl<'a> Probe<'a> {
    pub fn new(grid: &'a Grid, origin: Pos, facing: Dir, mover: Mover) -> Self {
        Self {
            grid,
            origin,
            facing,
            mover,
        }
    }

    /// Probe for an occupant at its indexed position. `None` when it is not on the grid.
    pub fn for_occupant(grid: &'a Grid, occupant: Occupant, facing: Dir) -> Option<Self> {
        let mover = match occupant {
            Occupant::Pacman => Mover::Pacman,
            Occupant::Ghost(_) => Mover::Ghost,
            _ => return None,
        };
        let origin = grid.position(occupant)?;
        Some(Self::new(grid, origin, facing, mover))
    }

    pub fn origin(&self) -> Pos {
        self.origin
    }

    /// Headings whose next tile can be entered, with that tile, in the
    /// fixed up, down, left, right order.
    pub fn viable_directions(&self, block_reverse: bool) -> Vec<(Dir, Pos)> {
        let mut viable = Vec::with_capacity(CARDINALS.len());
        for dir in CARDINALS {
            if block_reverse && dir.is_opposite(self.facing) {
                continue;
            }
            let to = self.grid.step(self.origin, dir);
            let blocked = self
                .grid
                .occupants_at(to.row, to.col)
                .map_or(true, |stack| stack.blocks(self.mover));
            if !blocked {
                viable.push((dir, to));
            }
        }
        viable
    }

    /// The tile one step ahead in the current facing.
    pub fn ahead(&self) -> Pos {
        self.grid.step(self.origin, self.facing)
    }

    /// Everything on the tile ahead, in stack order.
    pub fn peek_ahead(&self) -> Vec<Occupant> {
        let to = self.ahead();
        self.grid
            .occupants_at(to.row, to.col)
            .map(|stack| stack.as_slice().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{GhostId, PelletKind};

    fn grid_from(rows: &[&str]) -> Grid {
        let mut grid = Grid::new();
        for (r, line) in rows.iter().enumerate() {
            grid.add_row(line.len()).unwrap();
            for (c, ch) in line.chars().enumerate() {
                match ch {
                    '#' => grid.add_occupant(r, c, Occupant::Wall).unwrap(),
                    '|' => grid.add_occupant(r, c, Occupant::Gate).unwrap(),
                    '.' => grid
                        .add_occupant(r, c, Occupant::Pellet(PelletKind::Normal))
                        .unwrap(),
                    _ => {}
                }
            }
        }
        grid
    }

    #[test]
    fn viable_directions_skip_walls_and_reverse() {
        let grid = grid_from(&["#####", "#   #", "## ##", "#####"]);
        let probe = Probe::new(&grid, Pos::new(1, 2), Dir::Right, Mover::Pacman);
        let dirs: Vec<Dir> = probe
            .viable_directions(true)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        assert_eq!(dirs, vec![Dir::Down, Dir::Right]);

        let dirs: Vec<Dir> = probe
            .viable_directions(false)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        assert_eq!(dirs, vec![Dir::Down, Dir::Left, Dir::Right]);
    }

    #[test]
    fn viable_directions_report_destinations() {
        let grid = grid_from(&["   ", "   ", "   "]);
        let probe = Probe::new(&grid, Pos::new(0, 0), Dir::Static, Mover::Ghost);
        let viable = probe.viable_directions(true);
        assert_eq!(
            viable,
            vec![
                (Dir::Up, Pos::new(2, 0)),
                (Dir::Down, Pos::new(1, 0)),
                (Dir::Left, Pos::new(0, 2)),
                (Dir::Right, Pos::new(0, 1)),
            ]
        );
    }

    #[test]
    fn gate_is_viable_for_ghosts_only() {
        let grid = grid_from(&["###", "#|#", "# #", "###"]);
        let origin = Pos::new(2, 1);
        let pacman = Probe::new(&grid, origin, Dir::Up, Mover::Pacman);
        assert!(pacman.viable_directions(false).is_empty());
        let ghost = Probe::new(&grid, origin, Dir::Up, Mover::Ghost);
        assert_eq!(ghost.viable_directions(false), vec![(Dir::Up, Pos::new(1, 1))]);
    }

    #[test]
    fn peek_ahead_returns_every_occupant() {
        let mut grid = grid_from(&["    ", "    "]);
        grid.add_occupant(0, 2, Occupant::Pellet(PelletKind::Power)).unwrap();
        grid.add_occupant(0, 2, Occupant::Ghost(GhostId(3))).unwrap();
        grid.add_occupant(0, 1, Occupant::Pacman).unwrap();
        let probe = Probe::for_occupant(&grid, Occupant::Pacman, Dir::Right).unwrap();
        assert_eq!(probe.ahead(), Pos::new(0, 2));
        assert_eq!(
            probe.peek_ahead(),
            vec![Occupant::Pellet(PelletKind::Power), Occupant::Ghost(GhostId(3))]
        );
    }

    #[test]
    fn probe_needs_a_mobile_occupant_on_the_grid() {
        let grid = grid_from(&["  "]);
        assert!(Probe::for_occupant(&grid, Occupant::Pacman, Dir::Left).is_none());
        assert!(Probe::for_occupant(&grid, Occupant::Wall, Dir::Left).is_none());
    }
}
