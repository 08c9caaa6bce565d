//! Level construction and the orchestrator that reacts to entity signals.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver};
use tracing::{debug, info, warn};

use crate::actor::{self, CancelToken};
use crate::audio::{LoopHandle, SoundEffect, SoundPlayer};
use crate::broker::{self, Broker, Inbox};
use crate::chase::GhostKind;
use crate::components::{GhostId, Occupant};
use crate::config::{Tuning, MAX_GHOSTS};
use crate::error::{LevelError, LevelResult};
use crate::events::StateEvent;
use crate::ghost::{Ghost, GhostSetup};
use crate::input::{self, InputLatch, KeySource};
use crate::layout::Layout;
use crate::player::{Pacman, PacmanMode};
use crate::world::World;

const SEED_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Clone, Debug)]
pub struct LevelOptions {
    pub enemies: usize,
    pub tuning: Tuning,
    pub seed: u64,
}

impl Default for LevelOptions {
    fn default() -> Self {
        Self {
            enemies: 4,
            tuning: Tuning::default(),
            seed: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
    Aborted,
}

/// What the level reports upward once it is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelReport {
    pub score: u32,
    pub outcome: Outcome,
}

/// A fully populated level whose entities are not running yet.
pub struct Level {
    world: Arc<World>,
}

impl Level {
    pub fn new(layout: Layout, options: &LevelOptions, sound: SoundPlayer) -> LevelResult<Self> {
        if options.enemies == 0 {
            return Err(LevelError::NoGhosts);
        }
        if options.enemies > MAX_GHOSTS {
            return Err(LevelError::TooManyGhosts {
                requested: options.enemies,
                max: MAX_GHOSTS,
            });
        }

        let Layout {
            mut grid,
            player_spawn,
            ghost_home,
            corners,
        } = layout;
        if grid.pellet_count() == 0 {
            return Err(LevelError::NoPellets);
        }
        let tuning = options.tuning;

        let latch = Arc::new(InputLatch::new());
        let pacman = Arc::new(Pacman::new(latch, sound.clone()));
        grid.add_occupant(player_spawn.row, player_spawn.col, Occupant::Pacman)?;

        let ghosts: Vec<Arc<Ghost>> = (0..options.enemies)
            .map(|slot| {
                let kind = GhostKind::for_slot(slot);
                let setup = GhostSetup {
                    id: GhostId(slot),
                    kind,
                    home: ghost_home,
                    corner: corners.get(&kind).copied(),
                    idle_delay: tuning.spawn_interval * slot as u32,
                    seed: options.seed ^ (slot as u64 + 1).wrapping_mul(SEED_SPREAD),
                };
                Arc::new(Ghost::new(setup, sound.clone()))
            })
            .collect();
        // Stacked so the first ghost to leave the pen is drawn on top.
        for ghost in ghosts.iter().rev() {
            grid.add_occupant(ghost_home.row, ghost_home.col, Occupant::Ghost(ghost.id()))?;
        }

        let world = World::new(grid, pacman, ghosts, sound, tuning);
        Ok(Self {
            world: Arc::new(world),
        })
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Starts every entity loop, the input sampler and the orchestrator.
    pub fn spawn(self, keys: Box<dyn KeySource>) -> LevelResult<LevelHandle> {
        let world = self.world;
        // Counted up front: once entities run, one may hold the grid while
        // it waits for the orchestrator.
        let pellets_left = world.lock_grid().pellet_count();
        let cancel = CancelToken::new();
        let (broker, inbox) = broker::channel();

        let mut workers = Vec::new();
        if let Err(err) = start_workers(&world, keys, &broker, &cancel, &mut workers) {
            drop(inbox);
            cancel.cancel();
            for worker in workers {
                let _ = worker.join();
            }
            return Err(err);
        }
        drop(broker);

        let orchestrator = Orchestrator {
            world: Arc::clone(&world),
            cancel: cancel.clone(),
            workers,
            phase: 0,
            pellets_left,
            music: None,
        };
        let (report_tx, report_rx) = bounded(1);
        let name = "level-orchestrator".to_string();
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let report = orchestrator.run(inbox);
            let _ = report_tx.send(report);
        });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(source) => {
                cancel.cancel();
                return Err(LevelError::Spawn { name, source });
            }
        };

        Ok(LevelHandle {
            world,
            cancel,
            report: report_rx,
            finished: None,
            thread: Some(thread),
        })
    }
}

fn start_workers(
    world: &Arc<World>,
    keys: Box<dyn KeySource>,
    broker: &Broker,
    cancel: &CancelToken,
    workers: &mut Vec<JoinHandle<()>>,
) -> LevelResult<()> {
    let tuning = world.tuning();
    workers.push(input::spawn_sampler(
        keys,
        Arc::clone(world.pacman().latch()),
        tuning.input_poll,
        cancel.clone(),
    )?);
    workers.push(actor::spawn(
        Arc::clone(world.pacman()),
        Arc::clone(world),
        broker.clone(),
        cancel.clone(),
    )?);
    for ghost in world.ghosts() {
        workers.push(actor::spawn(
            Arc::clone(ghost),
            Arc::clone(world),
            broker.clone(),
            cancel.clone(),
        )?);
    }
    Ok(())
}

/// Reacts to entity signals. Never touches the grid.
struct Orchestrator {
    world: Arc<World>,
    cancel: CancelToken,
    workers: Vec<JoinHandle<()>>,
    phase: u32,
    pellets_left: usize,
    music: Option<LoopHandle>,
}

impl Orchestrator {
    fn run(mut self, inbox: Inbox) -> LevelReport {
        info!(
            ghosts = self.world.ghosts().len(),
            pellets = self.pellets_left,
            "level started"
        );
        let sound = self.world.sound().clone();
        sound.play_once(SoundEffect::GameStart);
        self.music = Some(sound.play_on_loop(SoundEffect::siren(self.phase)));

        let cancelled = self.cancel.clone();
        let outcome = loop {
            select! {
                recv(inbox.eat_pellet) -> msg => match msg {
                    Ok(power) => self.on_pellet(power),
                    Err(_) => break Outcome::Aborted,
                },
                recv(inbox.power_wear_off) -> msg => match msg {
                    Ok(()) => self.on_power_wear_off(),
                    Err(_) => break Outcome::Aborted,
                },
                recv(inbox.phase_change) -> msg => match msg {
                    Ok(phase) => self.on_phase_change(phase),
                    Err(_) => break Outcome::Aborted,
                },
                recv(inbox.remove_enemies) -> msg => match msg {
                    Ok(()) => self.on_remove_enemies(),
                    Err(_) => break Outcome::Aborted,
                },
                recv(inbox.end_game) -> msg => match msg {
                    Ok(()) => break self.final_outcome(),
                    Err(_) => break Outcome::Aborted,
                },
                recv(cancelled.receiver()) -> _ => break Outcome::Aborted,
            }
        };

        // Pending sends fail from here on, so no worker can stay blocked.
        drop(inbox);
        self.cancel.cancel();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("entity loop panicked");
            }
        }
        if let Some(music) = self.music.take() {
            music.stop();
        }

        let report = LevelReport {
            score: self.world.score(),
            outcome,
        };
        info!(score = report.score, outcome = ?report.outcome, "level finished");
        report
    }

    fn on_pellet(&mut self, power: bool) {
        self.pellets_left = self.pellets_left.saturating_sub(1);
        debug!(power, left = self.pellets_left, "pellet eaten");
        if power {
            if let Some(music) = &self.music {
                music.replace(SoundEffect::PowerPellet, true);
            }
            self.broadcast(StateEvent::PowerPelletEaten);
        }
        if self.pellets_left == 0 {
            info!("board cleared");
            if let Some(music) = self.music.take() {
                music.stop();
            }
            self.world.sound().play_once(SoundEffect::LevelWon);
            self.broadcast(StateEvent::GameOver);
            self.world.pacman().change_state(StateEvent::AllPelletsEaten);
        }
    }

    fn on_power_wear_off(&mut self) {
        debug!(phase = self.phase, "power wore off");
        if let Some(music) = &self.music {
            music.replace(SoundEffect::siren(self.phase), true);
        }
    }

    fn on_phase_change(&mut self, phase: u32) {
        if phase <= self.phase {
            return;
        }
        debug!(phase, "chase phase advanced");
        self.phase = phase;
        if let Some(music) = &self.music {
            music.replace(SoundEffect::siren(phase), false);
        }
    }

    fn on_remove_enemies(&mut self) {
        debug!("removing ghosts");
        if let Some(music) = self.music.take() {
            music.stop();
        }
        self.broadcast(StateEvent::GameOver);
    }

    fn broadcast(&self, event: StateEvent) {
        for ghost in self.world.ghosts() {
            ghost.change_state(event);
        }
    }

    fn final_outcome(&self) -> Outcome {
        match self.world.pacman().mode() {
            PacmanMode::Won => Outcome::Won,
            _ => Outcome::Lost,
        }
    }
}

/// A running level.
///
/// Dropping the handle cancels the level without waiting for it.
pub struct LevelHandle {
    world: Arc<World>,
    cancel: CancelToken,
    report: Receiver<LevelReport>,
    finished: Option<LevelReport>,
    thread: Option<JoinHandle<()>>,
}

impl LevelHandle {
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some() || self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Waits up to `timeout` for the level to end.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<LevelReport> {
        if self.finished.is_none() {
            let report = self.report.recv_timeout(timeout).ok()?;
            self.finished = Some(report);
            self.reap();
        }
        self.finished
    }

    /// Blocks until the level ends on its own.
    pub fn join(mut self) -> LevelReport {
        self.collect()
    }

    /// Cancels every loop and waits for them to stop.
    pub fn abort(mut self) -> LevelReport {
        self.cancel.cancel();
        self.collect()
    }

    fn collect(&mut self) -> LevelReport {
        if let Some(report) = self.finished {
            return report;
        }
        let report = self.report.recv().unwrap_or(LevelReport {
            score: self.world.score(),
            outcome: Outcome::Aborted,
        });
        self.finished = Some(report);
        self.reap();
        report
    }

    fn reap(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("orchestrator panicked");
            }
        }
    }
}

impl Drop for LevelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TimedBackend;

    const PEN: &str = "\
#####
#S..#
##|##
#.G.#
#####
";

    fn sound() -> SoundPlayer {
        SoundPlayer::new(Arc::new(TimedBackend::new(0.01)))
    }

    #[test]
    fn enemy_count_is_validated_first() {
        let none = LevelOptions {
            enemies: 0,
            ..LevelOptions::default()
        };
        let err = Level::new(Layout::parse(PEN).unwrap(), &none, sound()).err().unwrap();
        assert!(matches!(err, LevelError::NoGhosts));

        let crowd = LevelOptions {
            enemies: MAX_GHOSTS + 1,
            ..LevelOptions::default()
        };
        let err = Level::new(Layout::parse(PEN).unwrap(), &crowd, sound()).err().unwrap();
        assert!(matches!(err, LevelError::TooManyGhosts { requested: 9, max: 8 }));
    }

    #[test]
    fn board_without_pellets_is_rejected() {
        let bare = Layout::parse("#####\n#S  #\n##|##\n# G #\n#####\n").unwrap();
        let err = Level::new(bare, &LevelOptions::default(), sound()).err().unwrap();
        assert!(matches!(err, LevelError::NoPellets));
    }

    #[test]
    fn ghosts_stack_in_reverse_on_the_pen() {
        let options = LevelOptions {
            enemies: 3,
            ..LevelOptions::default()
        };
        let level = Level::new(Layout::parse(PEN).unwrap(), &options, sound()).unwrap();
        let world = level.world();
        let grid = world.lock_grid();
        assert_eq!(
            grid.occupants_at(3, 2).unwrap().as_slice(),
            &[
                Occupant::Ghost(GhostId(2)),
                Occupant::Ghost(GhostId(1)),
                Occupant::Ghost(GhostId(0)),
            ]
        );
        assert!(grid.occupants_at(1, 1).unwrap().contains(Occupant::Pacman));
    }

    #[test]
    fn ghosts_get_kinds_and_staggered_delays() {
        let options = LevelOptions {
            enemies: 5,
            ..LevelOptions::default()
        };
        let level = Level::new(Layout::parse(PEN).unwrap(), &options, sound()).unwrap();
        let kinds: Vec<GhostKind> = level.world().ghosts().iter().map(|g| g.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                GhostKind::Blinky,
                GhostKind::Pinky,
                GhostKind::Inky,
                GhostKind::Clyde,
                GhostKind::Blinky,
            ]
        );
    }

    #[test]
    fn aborting_reports_the_score_so_far() {
        let options = LevelOptions {
            enemies: 1,
            ..LevelOptions::default()
        };
        let level = Level::new(Layout::parse(PEN).unwrap(), &options, sound()).unwrap();
        let handle = level
            .spawn(Box::new(crate::input::ScriptedKeys::default()))
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        let report = handle.abort();
        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.score, 0);
    }
}
