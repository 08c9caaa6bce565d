//! Ghost state machine and movement.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::actor::{Actor, Flow};
use crate::audio::{LoopHandle, SoundEffect, SoundPlayer};
use crate::broker::Signal;
use crate::chase::{steer, GhostKind, Steer};
use crate::components::{
    Dir, GhostId, Layer, Mover, Occupant, Pos, CARDINALS, FLEEING_GHOST_LAYER, GHOST_LAYER,
};
use crate::config::Tuning;
use crate::events::StateEvent;
use crate::probe::Probe;
use crate::world::{Appearance, Sprite, TickContext, World};

pub const EAT_GHOST_SCORE: u32 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GhostMode {
    Idle,
    Scatter,
    Chase,
    Fleeing,
    Flickering,
    Captured,
    Ended,
}

use GhostMode::*;

const TRANSITIONS: &[(GhostMode, StateEvent, GhostMode)] = &[
    (Idle, StateEvent::Scatter, Scatter),
    (Idle, StateEvent::GameOver, Ended),
    (Scatter, StateEvent::ChasePacman, Chase),
    (Scatter, StateEvent::PowerPelletEaten, Fleeing),
    (Scatter, StateEvent::GameOver, Ended),
    (Chase, StateEvent::Scatter, Scatter),
    (Chase, StateEvent::PowerPelletEaten, Fleeing),
    (Chase, StateEvent::GameOver, Ended),
    (Fleeing, StateEvent::StartFlickering, Flickering),
    (Fleeing, StateEvent::GhostEaten, Captured),
    (Fleeing, StateEvent::PowerPelletEaten, Fleeing),
    (Fleeing, StateEvent::GameOver, Ended),
    (Flickering, StateEvent::PowerPelletWearOff, Chase),
    (Flickering, StateEvent::GhostEaten, Captured),
    (Flickering, StateEvent::PowerPelletEaten, Fleeing),
    (Flickering, StateEvent::GameOver, Ended),
    (Captured, StateEvent::ReachBase, Scatter),
    (Captured, StateEvent::GameOver, Ended),
];

/// Looks `event` up in the ghost transition table.
pub fn next_mode(mode: GhostMode, event: StateEvent) -> Option<GhostMode> {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == mode && *on == event)
        .map(|(_, _, to)| *to)
}

/// Turn bookkeeping: a ghost that changed heading spends the next tick
/// turning instead of moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Heading {
    prev: Dir,
    turned: bool,
}

impl Heading {
    fn new(facing: Dir) -> Self {
        Self {
            prev: facing,
            turned: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhostState {
    Idle { since: Instant },
    Scatter { since: Instant, heading: Heading },
    Chase { since: Instant, heading: Heading },
    Fleeing { since: Instant, heading: Heading, block_reverse: bool },
    Flickering { since: Instant, heading: Heading },
    Captured,
    Ended,
}

impl GhostState {
    pub fn enter(mode: GhostMode, facing: Dir, now: Instant) -> Self {
        let heading = Heading::new(facing);
        match mode {
            Idle => GhostState::Idle { since: now },
            Scatter => GhostState::Scatter { since: now, heading },
            Chase => GhostState::Chase { since: now, heading },
            Fleeing => GhostState::Fleeing {
                since: now,
                heading,
                block_reverse: true,
            },
            Flickering => GhostState::Flickering { since: now, heading },
            Captured => GhostState::Captured,
            Ended => GhostState::Ended,
        }
    }

    pub fn mode(&self) -> GhostMode {
        match self {
            GhostState::Idle { .. } => Idle,
            GhostState::Scatter { .. } => Scatter,
            GhostState::Chase { .. } => Chase,
            GhostState::Fleeing { .. } => Fleeing,
            GhostState::Flickering { .. } => Flickering,
            GhostState::Captured => Captured,
            GhostState::Ended => Ended,
        }
    }

    /// The state after `event`. Events without a table entry leave it untouched.
    pub fn apply_transition(self, event: StateEvent, facing: Dir, now: Instant) -> Self {
        match next_mode(self.mode(), event) {
            Some(mode) => Self::enter(mode, facing, now),
            None => self,
        }
    }

    /// Records the heading after a tick. A fleeing ghost may reverse from
    /// its second tick on.
    fn with_heading(self, heading: Heading) -> Self {
        match self {
            GhostState::Scatter { since, .. } => GhostState::Scatter { since, heading },
            GhostState::Chase { since, .. } => GhostState::Chase { since, heading },
            GhostState::Fleeing { since, .. } => GhostState::Fleeing {
                since,
                heading,
                block_reverse: false,
            },
            GhostState::Flickering { since, .. } => GhostState::Flickering { since, heading },
            other => other,
        }
    }
}

/// Spawn parameters for one ghost.
#[derive(Clone, Copy, Debug)]
pub struct GhostSetup {
    pub id: GhostId,
    pub kind: GhostKind,
    /// Pen tile the ghost returns to when captured.
    pub home: Pos,
    pub corner: Option<Pos>,
    pub idle_delay: Duration,
    pub seed: u64,
}

struct GhostBrain {
    state: GhostState,
    facing: Dir,
    frame: u32,
    phase: u32,
    rng: StdRng,
    retreat: Option<LoopHandle>,
}

pub struct Ghost {
    id: GhostId,
    kind: GhostKind,
    home: Pos,
    corner: Option<Pos>,
    idle_delay: Duration,
    sound: SoundPlayer,
    brain: Mutex<GhostBrain>,
}

impl Ghost {
    pub fn new(setup: GhostSetup, sound: SoundPlayer) -> Self {
        let mut rng = StdRng::seed_from_u64(setup.seed);
        let facing = CARDINALS[rng.gen_range(0..CARDINALS.len())];
        Self {
            id: setup.id,
            kind: setup.kind,
            home: setup.home,
            corner: setup.corner,
            idle_delay: setup.idle_delay,
            sound,
            brain: Mutex::new(GhostBrain {
                state: GhostState::enter(Idle, facing, Instant::now()),
                facing,
                frame: 0,
                phase: 0,
                rng,
                retreat: None,
            }),
        }
    }

    pub fn id(&self) -> GhostId {
        self.id
    }

    pub fn kind(&self) -> GhostKind {
        self.kind
    }

    pub fn home(&self) -> Pos {
        self.home
    }

    pub fn mode(&self) -> GhostMode {
        self.brain.lock().state.mode()
    }

    pub fn facing(&self) -> Dir {
        self.brain.lock().facing
    }

    pub fn phase(&self) -> u32 {
        self.brain.lock().phase
    }

    /// Points the ghost in `dir` without spending a tick turning.
    pub fn face(&self, dir: Dir) {
        let mut brain = self.brain.lock();
        brain.facing = dir;
        brain.state = match brain.state {
            GhostState::Fleeing {
                since,
                block_reverse,
                ..
            } => GhostState::Fleeing {
                since,
                heading: Heading::new(dir),
                block_reverse,
            },
            other => other.with_heading(Heading::new(dir)),
        };
    }

    /// Feeds `event` to the state machine. Safe from any thread; never
    /// touches the grid.
    pub fn change_state(&self, event: StateEvent) {
        let mut brain = self.brain.lock();
        self.transition(&mut brain, event, Instant::now());
    }

    /// Called when the player walks into this ghost. Returns `true` when the
    /// ghost catches the player. A frightened ghost is eaten instead.
    pub fn attempt_eat_player(&self, world: &World, now: Instant) -> bool {
        let mut brain = self.brain.lock();
        match brain.state.mode() {
            Scatter | Chase => true,
            Fleeing | Flickering => {
                self.get_eaten(&mut brain, world, now);
                false
            }
            Idle | Captured | Ended => false,
        }
    }

    pub fn layer(&self) -> Layer {
        match self.mode() {
            Fleeing | Flickering => FLEEING_GHOST_LAYER,
            _ => GHOST_LAYER,
        }
    }

    pub fn appearance(&self) -> Appearance {
        let brain = self.brain.lock();
        let mode = brain.state.mode();
        let (sprite, layer) = match mode {
            Fleeing => (Sprite::Frightened, FLEEING_GHOST_LAYER),
            Flickering => (Sprite::Flickering, FLEEING_GHOST_LAYER),
            Captured => (Sprite::Eyes, GHOST_LAYER),
            _ => (Sprite::Ghost(self.kind), GHOST_LAYER),
        };
        Appearance {
            sprite,
            facing: brain.facing,
            layer,
            frame: brain.frame,
        }
    }

    fn occupant(&self) -> Occupant {
        Occupant::Ghost(self.id)
    }

    fn transition(&self, brain: &mut GhostBrain, event: StateEvent, now: Instant) -> bool {
        let from = brain.state.mode();
        let Some(to) = next_mode(from, event) else {
            trace!(ghost = self.id.0, ?from, ?event, "event ignored");
            return false;
        };
        if from == Captured {
            if let Some(retreat) = brain.retreat.take() {
                retreat.stop();
            }
        }
        brain.state = brain.state.apply_transition(event, brain.facing, now);
        if to == Captured {
            brain.retreat = Some(self.sound.play_on_loop(SoundEffect::Retreating));
        }
        debug!(ghost = self.id.0, kind = ?self.kind, ?from, ?to, ?event, "ghost transition");
        true
    }

    fn get_eaten(&self, brain: &mut GhostBrain, world: &World, now: Instant) {
        let score = world.add_score(EAT_GHOST_SCORE);
        self.sound.play_once(SoundEffect::EatEnemy);
        debug!(ghost = self.id.0, score, "ghost eaten");
        self.transition(brain, StateEvent::GhostEaten, now);
    }

    /// Steering target while in `mode`, recomputed every tick.
    fn target(&self, ctx: &TickContext<'_>, mode: GhostMode, me: Pos) -> Option<Pos> {
        let player = ctx.grid.position(Occupant::Pacman);
        match mode {
            Scatter => self.corner,
            Chase => {
                let player = player?;
                let facing = ctx.world.pacman().facing();
                self.kind
                    .chase_target(ctx.grid, me, player, facing, self.corner)
            }
            Fleeing | Flickering => player,
            Captured => Some(self.home),
            Idle | Ended => None,
        }
    }

    /// Steering followed by a move, unless the ghost turned on the previous tick.
    fn roam(
        &self,
        ctx: &mut TickContext<'_>,
        brain: &mut GhostBrain,
        mut heading: Heading,
        rule: Steer,
        block_reverse: bool,
    ) -> Heading {
        if !heading.turned {
            if let Some(me) = ctx.grid.position(self.occupant()) {
                let target = self.target(ctx, brain.state.mode(), me);
                let viable = Probe::new(ctx.grid, me, brain.facing, Mover::Ghost)
                    .viable_directions(block_reverse);
                if let Some(dir) = steer(&viable, brain.facing, target, rule, &mut brain.rng) {
                    brain.facing = dir;
                }
            }
        }
        heading.turned = brain.facing != heading.prev;
        if !heading.turned {
            self.advance(ctx, brain);
        }
        heading.prev = brain.facing;
        heading
    }

    /// Resolves the tile ahead and moves onto it when possible.
    fn advance(&self, ctx: &mut TickContext<'_>, brain: &mut GhostBrain) {
        let me = self.occupant();
        let Some(pos) = ctx.grid.position(me) else {
            warn!(ghost = self.id.0, "ghost is not on the grid, move skipped");
            return;
        };
        let probe = Probe::new(ctx.grid, pos, brain.facing, Mover::Ghost);
        let ahead = probe.peek_ahead();
        if ahead.iter().any(|o| o.blocks(Mover::Ghost)) {
            let viable = probe.viable_directions(false);
            if let Some((dir, _)) = viable.choose(&mut brain.rng) {
                brain.facing = *dir;
            }
            return;
        }
        if ahead.contains(&Occupant::Pacman) {
            self.meet_player(ctx, brain);
        }
        ctx.grid.move_entity(me, brain.facing);
        brain.frame = brain.frame.wrapping_add(1);
    }

    fn meet_player(&self, ctx: &mut TickContext<'_>, brain: &mut GhostBrain) {
        match brain.state.mode() {
            Scatter | Chase => {
                debug!(ghost = self.id.0, "ghost caught the player");
                ctx.world.pacman().change_state(StateEvent::PacManEaten);
            }
            Fleeing | Flickering => self.get_eaten(brain, ctx.world, ctx.now),
            Idle | Captured | Ended => {}
        }
    }

    fn check_timers(&self, ctx: &mut TickContext<'_>, brain: &mut GhostBrain, tuning: &Tuning) {
        let now = ctx.now;
        let state = brain.state;
        match state {
            GhostState::Idle { since } if now.duration_since(since) >= self.idle_delay => {
                self.transition(brain, StateEvent::Scatter, now);
            }
            GhostState::Scatter { since, .. }
                if now.duration_since(since) >= tuning.scatter_duration =>
            {
                self.transition(brain, StateEvent::ChasePacman, now);
            }
            GhostState::Chase { since, .. }
                if brain.phase < tuning.chase_phase_limit
                    && now.duration_since(since) >= tuning.chase_duration =>
            {
                brain.phase += 1;
                ctx.outbox.push(Signal::PhaseChange(brain.phase));
                self.transition(brain, StateEvent::Scatter, now);
            }
            GhostState::Fleeing { since, .. }
                if now.duration_since(since) >= tuning.fleeing_duration() =>
            {
                self.transition(brain, StateEvent::StartFlickering, now);
            }
            GhostState::Flickering { since, .. }
                if now.duration_since(since) >= tuning.flicker_duration =>
            {
                self.transition(brain, StateEvent::PowerPelletWearOff, now);
            }
            _ => {}
        }
    }
}

impl Actor for Ghost {
    fn name(&self) -> String {
        format!("ghost-{}-{:?}", self.id.0, self.kind).to_lowercase()
    }

    fn tick_interval(&self, tuning: &Tuning) -> Duration {
        let fps = match self.mode() {
            Fleeing | Flickering => tuning.fleeing_fps,
            Captured => tuning.captured_fps,
            _ => tuning.ghost_fps,
        };
        tuning.tick_interval(fps)
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Flow {
        let tuning = *ctx.world.tuning();
        let mut guard = self.brain.lock();
        let brain = &mut *guard;
        let state = brain.state;
        let mode = state.mode();
        match state {
            GhostState::Ended => {
                ctx.grid.remove_entity(self.occupant());
                debug!(ghost = self.id.0, "ghost left the board");
                return Flow::Halt;
            }
            GhostState::Idle { .. } => {
                brain.frame = brain.frame.wrapping_add(1);
            }
            GhostState::Captured => {
                if let Some(me) = ctx.grid.position(self.occupant()) {
                    let viable = Probe::new(ctx.grid, me, brain.facing, Mover::Ghost)
                        .viable_directions(true);
                    let home = Some(self.home);
                    if let Some(dir) = steer(&viable, brain.facing, home, Steer::Toward, &mut brain.rng)
                    {
                        brain.facing = dir;
                    }
                }
                self.advance(ctx, brain);
                let home_reached = ctx
                    .grid
                    .position(self.occupant())
                    .is_some_and(|pos| pos.distance_to(self.home) < 1.0);
                if home_reached {
                    self.transition(brain, StateEvent::ReachBase, ctx.now);
                }
                return Flow::Continue;
            }
            GhostState::Scatter { heading, .. } | GhostState::Chase { heading, .. } => {
                let heading = self.roam(ctx, brain, heading, Steer::Toward, true);
                if brain.state.mode() == mode {
                    brain.state = brain.state.with_heading(heading);
                }
            }
            GhostState::Fleeing {
                heading,
                block_reverse,
                ..
            } => {
                let heading = self.roam(ctx, brain, heading, Steer::Away, block_reverse);
                if brain.state.mode() == mode {
                    brain.state = brain.state.with_heading(heading);
                }
            }
            GhostState::Flickering { heading, .. } => {
                let heading = self.roam(ctx, brain, heading, Steer::Away, true);
                if brain.state.mode() == mode {
                    brain.state = brain.state.with_heading(heading);
                }
            }
        }
        if brain.state.mode() == mode {
            self.check_timers(ctx, brain, &tuning);
        }
        Flow::Continue
    }
}
