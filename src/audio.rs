//! Sound effect playback over a pluggable backend.
//!
//! The engine only decides *when* something should be heard. Decoding and
//! mixing belong to whatever implements [`AudioBackend`]; the crate ships
//! [`TimedBackend`], which plays nothing, keeps clip lengths realistic and
//! records what was requested.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

const LOOP_POLL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    Munch,
    GameStart,
    Siren1,
    Siren2,
    Siren3,
    Siren4,
    PowerPellet,
    EatEnemy,
    Retreating,
    Dying,
    LevelWon,
}

impl SoundEffect {
    /// Background siren for a chase phase, cycling through the four sirens.
    pub fn siren(phase: u32) -> Self {
        match phase % 4 {
            0 => SoundEffect::Siren1,
            1 => SoundEffect::Siren2,
            2 => SoundEffect::Siren3,
            _ => SoundEffect::Siren4,
        }
    }

    /// Length of the recorded clip.
    pub fn nominal_length(self) -> Duration {
        let ms = match self {
            SoundEffect::Munch => 150,
            SoundEffect::GameStart => 4200,
            SoundEffect::Siren1 => 400,
            SoundEffect::Siren2 => 370,
            SoundEffect::Siren3 => 340,
            SoundEffect::Siren4 => 310,
            SoundEffect::PowerPellet => 270,
            SoundEffect::EatEnemy => 560,
            SoundEffect::Retreating => 270,
            SoundEffect::Dying => 1500,
            SoundEffect::LevelWon => 1950,
        };
        Duration::from_millis(ms)
    }
}

/// One playing instance of an effect.
pub trait Clip: Send {
    fn is_playing(&self) -> bool;
    fn pause(&mut self);
}

pub trait AudioBackend: Send + Sync {
    /// Starts playing `effect` and hands back the playing clip.
    fn start(&self, effect: SoundEffect) -> Box<dyn Clip>;
}

#[derive(Clone)]
pub struct SoundPlayer {
    backend: Arc<dyn AudioBackend>,
}

impl SoundPlayer {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    /// Fire and forget.
    pub fn play_once(&self, effect: SoundEffect) {
        trace!(?effect, "play once");
        drop(self.backend.start(effect));
    }

    /// Keeps re-triggering `effect` on a background thread until the returned
    /// handle is stopped.
    pub fn play_on_loop(&self, effect: SoundEffect) -> LoopHandle {
        let control = Arc::new(Mutex::new(LoopControl {
            keep_playing: true,
            queued: None,
            clip: None,
        }));
        let handle = LoopHandle {
            control: Arc::clone(&control),
        };
        let backend = Arc::clone(&self.backend);
        let spawned = thread::Builder::new()
            .name(format!("sound-loop-{effect:?}"))
            .spawn(move || run_loop(backend.as_ref(), &control, effect));
        if let Err(err) = spawned {
            warn!(?effect, %err, "could not start sound loop");
        }
        handle
    }
}

struct LoopControl {
    keep_playing: bool,
    queued: Option<SoundEffect>,
    clip: Option<Box<dyn Clip>>,
}

impl LoopControl {
    fn pause_clip(&mut self) {
        if let Some(clip) = self.clip.as_mut() {
            clip.pause();
        }
    }
}

/// Control over a sound playing on loop. Cloning shares the same loop.
#[derive(Clone)]
pub struct LoopHandle {
    control: Arc<Mutex<LoopControl>>,
}

impl LoopHandle {
    /// Pauses the current clip and ends the loop. The background thread may
    /// take one more poll to notice.
    pub fn stop(&self) {
        let mut control = self.control.lock();
        control.pause_clip();
        control.keep_playing = false;
        control.queued = None;
    }

    /// Switches the loop to `effect`. With `immediate` the current clip is cut
    /// short, otherwise it finishes first.
    pub fn replace(&self, effect: SoundEffect, immediate: bool) {
        let mut control = self.control.lock();
        if immediate {
            control.pause_clip();
        }
        control.queued = Some(effect);
        control.keep_playing = false;
    }
}

fn run_loop(backend: &dyn AudioBackend, control: &Mutex<LoopControl>, first: SoundEffect) {
    let mut effect = first;
    loop {
        {
            let mut state = control.lock();
            if !state.keep_playing {
                match state.queued.take() {
                    Some(next) => {
                        state.keep_playing = true;
                        effect = next;
                    }
                    None => break,
                }
            }
            state.clip = Some(backend.start(effect));
        }
        loop {
            thread::sleep(LOOP_POLL);
            let state = control.lock();
            let playing = state.clip.as_ref().is_some_and(|clip| clip.is_playing());
            if !playing {
                break;
            }
        }
    }
    debug!(?effect, "sound loop finished");
}

/// Backend that plays nothing but keeps every clip "playing" for its nominal
/// length, scaled by `length_scale`. It remembers every effect started.
pub struct TimedBackend {
    length_scale: f64,
    history: Mutex<Vec<SoundEffect>>,
}

impl TimedBackend {
    pub fn new(length_scale: f64) -> Self {
        Self {
            length_scale,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history(&self) -> Vec<SoundEffect> {
        self.history.lock().clone()
    }

    pub fn count(&self, effect: SoundEffect) -> usize {
        self.history.lock().iter().filter(|e| **e == effect).count()
    }
}

impl Default for TimedBackend {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioBackend for TimedBackend {
    fn start(&self, effect: SoundEffect) -> Box<dyn Clip> {
        debug!(?effect, "sound started");
        self.history.lock().push(effect);
        Box::new(TimedClip {
            ends_at: Instant::now() + effect.nominal_length().mul_f64(self.length_scale),
            paused: false,
        })
    }
}

struct TimedClip {
    ends_at: Instant,
    paused: bool,
}

impl Clip for TimedClip {
    fn is_playing(&self) -> bool {
        !self.paused && Instant::now() < self.ends_at
    }

    fn pause(&mut self) {
        self.paused = true;
    }
}
