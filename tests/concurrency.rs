//! Many ghost loops moving on one grid at full speed.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pacman_engine::actor::{self, CancelToken};
use pacman_engine::broker;
use pacman_engine::components::Occupant;
use pacman_engine::config::MAX_GHOSTS;
use pacman_engine::{Layout, Level, LevelOptions, SoundPlayer, TimedBackend, Tuning, World};

const ARENA: &str = "\
B#########P
#S........#
#.###.###.#
#.........#
#.#.#G#.#.#
#.........#
#.###.###.#
#.........#
I#########C
";

fn assert_consistent(world: &World) {
    let grid = world.lock_grid();
    for ghost in world.ghosts() {
        let occupant = Occupant::Ghost(ghost.id());
        let found = grid.find_all(occupant);
        assert_eq!(found.len(), 1, "{occupant:?} found at {found:?}");
        assert_eq!(grid.position(occupant), Some(found[0]));
    }
}

#[test]
fn ghosts_never_duplicate_or_vanish() {
    let tuning = Tuning {
        spawn_interval: Duration::ZERO,
        scatter_duration: Duration::from_millis(40),
        chase_duration: Duration::from_secs(60),
        tick_scale: 0.01,
        ..Tuning::default()
    };
    let options = LevelOptions {
        enemies: MAX_GHOSTS,
        tuning,
        seed: 42,
    };
    let sound = SoundPlayer::new(Arc::new(TimedBackend::new(0.01)));
    let level = Level::new(Layout::parse(ARENA).unwrap(), &options, sound).unwrap();
    let world = Arc::clone(level.world());
    // Keep the player out of the way so nothing ends the run early.
    world.lock_grid().remove_entity(Occupant::Pacman);

    let cancel = CancelToken::new();
    let (broker, inbox) = broker::channel();
    let workers: Vec<_> = world
        .ghosts()
        .iter()
        .map(|ghost| {
            actor::spawn(
                Arc::clone(ghost),
                Arc::clone(&world),
                broker.clone(),
                cancel.clone(),
            )
            .unwrap()
        })
        .collect();

    let deadline = Instant::now() + Duration::from_millis(400);
    let mut checks = 0;
    while Instant::now() < deadline {
        assert_consistent(&world);
        checks += 1;
        thread::sleep(Duration::from_millis(5));
    }

    drop(inbox);
    cancel.cancel();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_consistent(&world);
    assert!(checks > 10);
}

#[test]
fn cancel_wakes_sleeping_loops() {
    let tuning = Tuning {
        ghost_fps: 1,
        tick_scale: 100.0,
        ..Tuning::default()
    };
    let options = LevelOptions {
        enemies: 4,
        tuning,
        seed: 1,
    };
    let sound = SoundPlayer::new(Arc::new(TimedBackend::new(0.01)));
    let level = Level::new(Layout::parse(ARENA).unwrap(), &options, sound).unwrap();
    let world = Arc::clone(level.world());

    let cancel = CancelToken::new();
    let (broker, _inbox) = broker::channel();
    let workers: Vec<_> = world
        .ghosts()
        .iter()
        .map(|ghost| {
            actor::spawn(
                Arc::clone(ghost),
                Arc::clone(&world),
                broker.clone(),
                cancel.clone(),
            )
            .unwrap()
        })
        .collect();
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    cancel.cancel();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(5));
}
