//! The player's state machine and movement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::actor::{Actor, Flow};
use crate::audio::{SoundEffect, SoundPlayer};
use crate::broker::Signal;
use crate::components::{Dir, Mover, Occupant, Pos, PACMAN_LAYER};
use crate::config::Tuning;
use crate::events::StateEvent;
use crate::input::InputLatch;
use crate::probe::Probe;
use crate::world::{Appearance, Sprite, TickContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacmanMode {
    Walking,
    Empowered,
    Dead,
    Won,
}

const TRANSITIONS: &[(PacmanMode, StateEvent, PacmanMode)] = &[
    (PacmanMode::Walking, StateEvent::PowerPelletEaten, PacmanMode::Empowered),
    (PacmanMode::Walking, StateEvent::PacManEaten, PacmanMode::Dead),
    (PacmanMode::Walking, StateEvent::AllPelletsEaten, PacmanMode::Won),
    (PacmanMode::Empowered, StateEvent::PowerPelletEaten, PacmanMode::Empowered),
    (PacmanMode::Empowered, StateEvent::PowerPelletWearOff, PacmanMode::Walking),
    (PacmanMode::Empowered, StateEvent::PacManEaten, PacmanMode::Dead),
    (PacmanMode::Empowered, StateEvent::AllPelletsEaten, PacmanMode::Won),
];

pub fn next_mode(mode: PacmanMode, event: StateEvent) -> Option<PacmanMode> {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == mode && *on == event)
        .map(|(_, _, to)| *to)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacmanState {
    Walking,
    Empowered { since: Instant },
    /// `frame` counts the death animation frames shown so far.
    Dead { frame: u32 },
    Won,
}

impl PacmanState {
    pub fn enter(mode: PacmanMode, now: Instant) -> Self {
        match mode {
            PacmanMode::Walking => PacmanState::Walking,
            PacmanMode::Empowered => PacmanState::Empowered { since: now },
            PacmanMode::Dead => PacmanState::Dead { frame: 0 },
            PacmanMode::Won => PacmanState::Won,
        }
    }

    pub fn mode(&self) -> PacmanMode {
        match self {
            PacmanState::Walking => PacmanMode::Walking,
            PacmanState::Empowered { .. } => PacmanMode::Empowered,
            PacmanState::Dead { .. } => PacmanMode::Dead,
            PacmanState::Won => PacmanMode::Won,
        }
    }

    pub fn apply_transition(self, event: StateEvent, now: Instant) -> Self {
        match next_mode(self.mode(), event) {
            Some(mode) => Self::enter(mode, now),
            None => self,
        }
    }
}

struct PacmanBrain {
    state: PacmanState,
    facing: Dir,
    prev_facing: Dir,
    frame: u32,
}

pub struct Pacman {
    latch: Arc<InputLatch>,
    sound: SoundPlayer,
    brain: Mutex<PacmanBrain>,
}

impl Pacman {
    pub fn new(latch: Arc<InputLatch>, sound: SoundPlayer) -> Self {
        Self {
            latch,
            sound,
            brain: Mutex::new(PacmanBrain {
                state: PacmanState::Walking,
                facing: Dir::Static,
                prev_facing: Dir::Static,
                frame: 0,
            }),
        }
    }

    pub fn latch(&self) -> &Arc<InputLatch> {
        &self.latch
    }

    pub fn mode(&self) -> PacmanMode {
        self.brain.lock().state.mode()
    }

    pub fn state(&self) -> PacmanState {
        self.brain.lock().state
    }

    pub fn facing(&self) -> Dir {
        self.brain.lock().facing
    }

    /// Sets the heading as if the player had been walking that way already.
    pub fn face(&self, dir: Dir) {
        let mut brain = self.brain.lock();
        brain.facing = dir;
        brain.prev_facing = dir;
    }

    /// Feeds `event` to the state machine. Safe from any thread; never
    /// touches the grid.
    pub fn change_state(&self, event: StateEvent) {
        let mut brain = self.brain.lock();
        transition(&mut brain, event, Instant::now());
    }

    pub fn appearance(&self) -> Appearance {
        let brain = self.brain.lock();
        let (sprite, frame) = match brain.state {
            PacmanState::Dead { frame } => (Sprite::Dying, frame),
            _ => (Sprite::Pacman, brain.frame),
        };
        Appearance {
            sprite,
            facing: brain.facing,
            layer: PACMAN_LAYER,
            frame,
        }
    }

    /// Looks at the tile ahead and acts on it. `retry` allows falling back to
    /// the previous heading once when a fresh turn runs into a wall.
    fn resolve(&self, ctx: &mut TickContext<'_>, brain: &mut PacmanBrain, retry: bool) {
        let Some(pos) = ctx.grid.position(Occupant::Pacman) else {
            warn!("player is not on the grid, move skipped");
            return;
        };
        let probe = Probe::new(ctx.grid, pos, brain.facing, Mover::Pacman);
        let target = probe.ahead();
        let ahead = probe.peek_ahead();

        if ahead.iter().any(|o| o.blocks(Mover::Pacman)) {
            if retry && brain.facing != brain.prev_facing {
                trace!(blocked = ?brain.facing, back_to = ?brain.prev_facing, "turn blocked");
                brain.facing = brain.prev_facing;
                if brain.facing != Dir::Static {
                    self.resolve(ctx, brain, false);
                }
            }
            return;
        }

        for occupant in &ahead {
            if matches!(occupant, Occupant::Pellet(_)) {
                self.eat_pellet(ctx, brain, target);
            }
        }

        for occupant in &ahead {
            let Occupant::Ghost(id) = *occupant else {
                continue;
            };
            let Some(ghost) = ctx.world.ghost(id) else {
                continue;
            };
            if ghost.attempt_eat_player(ctx.world, ctx.now) {
                debug!(ghost = id.0, "player ran into a ghost");
                transition(brain, StateEvent::PacManEaten, ctx.now);
                return;
            }
        }

        ctx.grid.move_entity(Occupant::Pacman, brain.facing);
        brain.frame = brain.frame.wrapping_add(1);
    }

    fn eat_pellet(&self, ctx: &mut TickContext<'_>, brain: &mut PacmanBrain, at: Pos) {
        let Some(kind) = ctx.grid.remove_pellet(at) else {
            return;
        };
        let score = ctx.world.add_score(kind.score());
        self.sound.play_once(SoundEffect::Munch);
        ctx.outbox.push(Signal::EatPellet {
            power: kind.is_power(),
        });
        trace!(?kind, score, "pellet eaten");
        if kind.is_power() {
            transition(brain, StateEvent::PowerPelletEaten, ctx.now);
        }
    }

    fn walk(&self, ctx: &mut TickContext<'_>, brain: &mut PacmanBrain, tuning: &Tuning) {
        if let Some(dir) = self.latch.recent(ctx.now, tuning.turn_buffer) {
            brain.facing = dir;
        }
        if brain.facing != Dir::Static {
            self.resolve(ctx, brain, true);
        }
        brain.prev_facing = brain.facing;

        if let PacmanState::Empowered { since } = brain.state {
            if ctx.now.duration_since(since) >= tuning.power_duration {
                ctx.outbox.push(Signal::PowerWearOff);
                transition(brain, StateEvent::PowerPelletWearOff, ctx.now);
            }
        }
    }
}

fn transition(brain: &mut PacmanBrain, event: StateEvent, now: Instant) -> bool {
    let from = brain.state.mode();
    let Some(to) = next_mode(from, event) else {
        trace!(?from, ?event, "event ignored");
        return false;
    };
    brain.state = brain.state.apply_transition(event, now);
    debug!(?from, ?to, ?event, "player transition");
    true
}

impl Actor for Pacman {
    fn name(&self) -> String {
        "pacman".to_string()
    }

    fn tick_interval(&self, tuning: &Tuning) -> Duration {
        let fps = match self.mode() {
            PacmanMode::Empowered => tuning.empowered_fps,
            _ => tuning.pacman_fps,
        };
        tuning.tick_interval(fps)
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Flow {
        let tuning = *ctx.world.tuning();
        let mut guard = self.brain.lock();
        let brain = &mut *guard;
        match brain.state {
            PacmanState::Walking | PacmanState::Empowered { .. } => {
                self.walk(ctx, brain, &tuning);
                Flow::Continue
            }
            PacmanState::Dead { frame } => {
                if frame == 0 {
                    info!(score = ctx.world.score(), "player died");
                    self.sound.play_once(SoundEffect::Dying);
                    ctx.outbox.push(Signal::RemoveEnemies);
                }
                let frame = frame + 1;
                brain.state = PacmanState::Dead { frame };
                if frame < tuning.death_frames {
                    return Flow::Continue;
                }
                ctx.grid.remove_entity(Occupant::Pacman);
                ctx.outbox.push(Signal::EndGame);
                Flow::Halt
            }
            PacmanState::Won => {
                info!(score = ctx.world.score(), "all pellets eaten");
                ctx.outbox.push(Signal::EndGame);
                Flow::Halt
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [PacmanMode; 4] = [
        PacmanMode::Walking,
        PacmanMode::Empowered,
        PacmanMode::Dead,
        PacmanMode::Won,
    ];

    #[test]
    fn unmatched_events_leave_the_state_untouched() {
        let now = Instant::now();
        for mode in MODES {
            let state = PacmanState::enter(mode, now);
            for event in StateEvent::ALL {
                if next_mode(mode, event).is_none() {
                    let later = now + Duration::from_secs(2);
                    assert_eq!(state.apply_transition(event, later), state);
                }
            }
        }
    }

    #[test]
    fn terminal_states_ignore_everything() {
        for event in StateEvent::ALL {
            assert_eq!(next_mode(PacmanMode::Dead, event), None);
            assert_eq!(next_mode(PacmanMode::Won, event), None);
        }
    }

    #[test]
    fn power_pellet_refreshes_empowerment() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(4);
        let state = PacmanState::enter(PacmanMode::Empowered, t0);
        assert_eq!(
            state.apply_transition(StateEvent::PowerPelletEaten, t1),
            PacmanState::Empowered { since: t1 }
        );
        assert_eq!(
            state.apply_transition(StateEvent::PowerPelletWearOff, t1),
            PacmanState::Walking
        );
    }

    #[test]
    fn caught_from_either_live_state() {
        assert_eq!(next_mode(PacmanMode::Walking, StateEvent::PacManEaten), Some(PacmanMode::Dead));
        assert_eq!(next_mode(PacmanMode::Empowered, StateEvent::PacManEaten), Some(PacmanMode::Dead));
        assert_eq!(next_mode(PacmanMode::Walking, StateEvent::PowerPelletWearOff), None);
    }
}
