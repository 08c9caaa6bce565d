//! Ghost personalities and heading selection.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::{Dir, Pos};
use crate::grid::Grid;

/// How far ahead of (or behind) the player the ambush and flank ghosts aim.
const LEAD_TILES: isize = 3;
/// Closer than this, the shy ghost gives up and heads for its corner.
const SHY_DISTANCE: f64 = 3.0;

/// Chase personality, assigned round-robin when ghosts are spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GhostKind {
    /// Aims straight at the player.
    Blinky,
    /// Aims a few tiles ahead of the player.
    Pinky,
    /// Aims a few tiles behind the player.
    Inky,
    /// Chases from afar, retreats to its corner up close.
    Clyde,
}

impl GhostKind {
    pub const ROSTER: [GhostKind; 4] = [
        GhostKind::Blinky,
        GhostKind::Pinky,
        GhostKind::Inky,
        GhostKind::Clyde,
    ];

    /// Personality of the `index`-th ghost of a level.
    pub fn for_slot(index: usize) -> Self {
        Self::ROSTER[index % Self::ROSTER.len()]
    }

    /// Tile to steer at while chasing. `None` means wander.
    pub fn chase_target(
        self,
        grid: &Grid,
        ghost: Pos,
        player: Pos,
        player_facing: Dir,
        corner: Option<Pos>,
    ) -> Option<Pos> {
        match self {
            GhostKind::Blinky => Some(player),
            GhostKind::Pinky => Some(grid.offset(player, player_facing, LEAD_TILES)),
            GhostKind::Inky => Some(grid.offset(player, player_facing, -LEAD_TILES)),
            GhostKind::Clyde => {
                if ghost.distance_to(player) >= SHY_DISTANCE {
                    Some(player)
                } else {
                    corner
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Steer {
    Toward,
    Away,
}

/// Picks a new heading among `viable` (as produced by the collision probe).
///
/// Returns `None` when the heading should not change: nothing is viable, or
/// the only option is to keep going straight. Without a target a random
/// viable heading is picked. Otherwise the destination nearest to (or
/// farthest from) the target wins, the earliest candidate on ties.
pub fn steer<R: Rng + ?Sized>(
    viable: &[(Dir, Pos)],
    facing: Dir,
    target: Option<Pos>,
    rule: Steer,
    rng: &mut R,
) -> Option<Dir> {
    if let [(only, _)] = viable {
        if *only == facing {
            return None;
        }
    }
    let Some(target) = target else {
        return viable.choose(rng).map(|(dir, _)| *dir);
    };
    let mut best: Option<(Dir, f64)> = None;
    for &(dir, to) in viable {
        let distance = to.distance_to(target);
        let better = match (best, rule) {
            (None, _) => true,
            (Some((_, d)), Steer::Toward) => distance < d,
            (Some((_, d)), Steer::Away) => distance > d,
        };
        if better {
            best = Some((dir, distance));
        }
    }
    best.map(|(dir, _)| dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn open_grid(rows: usize, cols: usize) -> Grid {
        let mut grid = Grid::new();
        for _ in 0..rows {
            grid.add_row(cols).unwrap();
        }
        grid
    }

    #[test]
    fn ambush_aims_three_tiles_ahead() {
        let grid = open_grid(10, 10);
        let player = Pos::new(4, 4);
        let target = GhostKind::Pinky.chase_target(&grid, Pos::new(9, 9), player, Dir::Up, None);
        assert_eq!(target, Some(Pos::new(1, 4)));
    }

    #[test]
    fn ambush_target_wraps_on_small_grids() {
        let grid = open_grid(3, 3);
        let target =
            GhostKind::Pinky.chase_target(&grid, Pos::new(0, 0), Pos::new(1, 1), Dir::Right, None);
        assert_eq!(target, Some(Pos::new(1, 1)));
        let target =
            GhostKind::Pinky.chase_target(&grid, Pos::new(0, 0), Pos::new(0, 0), Dir::Up, None);
        assert_eq!(target, Some(Pos::new(0, 0)));
    }

    #[test]
    fn flank_mirrors_ambush() {
        let grid = open_grid(10, 10);
        let target =
            GhostKind::Inky.chase_target(&grid, Pos::new(0, 0), Pos::new(4, 4), Dir::Up, None);
        assert_eq!(target, Some(Pos::new(7, 4)));
    }

    #[test]
    fn shy_ghost_retreats_up_close() {
        let grid = open_grid(10, 10);
        let corner = Some(Pos::new(0, 9));
        let player = Pos::new(5, 5);
        let far = GhostKind::Clyde.chase_target(&grid, Pos::new(5, 8), player, Dir::Left, corner);
        assert_eq!(far, Some(player));
        let near = GhostKind::Clyde.chase_target(&grid, Pos::new(5, 7), player, Dir::Left, corner);
        assert_eq!(near, corner);
        let lost = GhostKind::Clyde.chase_target(&grid, Pos::new(5, 6), player, Dir::Left, None);
        assert_eq!(lost, None);
    }

    #[test]
    fn roster_cycles() {
        assert_eq!(GhostKind::for_slot(0), GhostKind::Blinky);
        assert_eq!(GhostKind::for_slot(3), GhostKind::Clyde);
        assert_eq!(GhostKind::for_slot(5), GhostKind::Pinky);
    }

    #[test]
    fn ties_go_to_the_first_direction() {
        let mut rng = StdRng::seed_from_u64(7);
        // Both destinations are one tile from the target.
        let viable = [(Dir::Up, Pos::new(1, 2)), (Dir::Left, Pos::new(2, 1))];
        let target = Some(Pos::new(1, 1));
        let picked = steer(&viable, Dir::Right, target, Steer::Toward, &mut rng);
        assert_eq!(picked, Some(Dir::Up));
        let swapped = [(Dir::Down, Pos::new(1, 2)), (Dir::Right, Pos::new(2, 1))];
        let picked = steer(&swapped, Dir::Up, target, Steer::Toward, &mut rng);
        assert_eq!(picked, Some(Dir::Down));
    }

    #[test]
    fn away_picks_the_farthest() {
        let mut rng = StdRng::seed_from_u64(1);
        let viable = [
            (Dir::Up, Pos::new(0, 5)),
            (Dir::Down, Pos::new(2, 5)),
            (Dir::Right, Pos::new(1, 6)),
        ];
        let picked = steer(&viable, Dir::Up, Some(Pos::new(0, 4)), Steer::Away, &mut rng);
        assert_eq!(picked, Some(Dir::Down));
    }

    #[test]
    fn lone_straight_option_keeps_heading() {
        let mut rng = StdRng::seed_from_u64(3);
        let viable = [(Dir::Left, Pos::new(0, 0))];
        assert_eq!(steer(&viable, Dir::Left, Some(Pos::new(9, 9)), Steer::Toward, &mut rng), None);
        assert_eq!(
            steer(&viable, Dir::Up, Some(Pos::new(9, 9)), Steer::Toward, &mut rng),
            Some(Dir::Left)
        );
        assert_eq!(steer(&[], Dir::Up, None, Steer::Toward, &mut rng), None);
    }

    #[test]
    fn no_target_picks_a_viable_direction() {
        let mut rng = StdRng::seed_from_u64(11);
        let viable = [(Dir::Down, Pos::new(1, 0)), (Dir::Right, Pos::new(0, 1))];
        for _ in 0..20 {
            let picked = steer(&viable, Dir::Static, None, Steer::Toward, &mut rng).unwrap();
            assert!(picked == Dir::Down || picked == Dir::Right);
        }
    }
}
