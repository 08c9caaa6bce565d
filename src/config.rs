//! Timing knobs for a level.
//!
//! Defaults match the arcade feel the game is tuned for. `PACMAN_TIME_SCALE`
//! stretches or shrinks every duration at once, which is mostly useful for
//! watching the state machines in slow motion.

use std::time::Duration;

use tracing::warn;

pub const MAX_GHOSTS: usize = 8;
/// Accepted range for `PACMAN_TIME_SCALE`.
pub const MIN_TIME_SCALE: f64 = 0.01;
pub const MAX_TIME_SCALE: f64 = 100.0;

const DEFAULT_PACMAN_FPS: u32 = 6;
const DEFAULT_EMPOWERED_FPS: u32 = 8;
const DEFAULT_GHOST_FPS: u32 = 6;
const DEFAULT_FLEEING_FPS: u32 = 4;
const DEFAULT_CAPTURED_FPS: u32 = 12;
const SCATTER_SECS: u64 = 7;
const CHASE_SECS: u64 = 20;
const POWER_SECS: u64 = 7;
const FLICKER_SECS: u64 = 2;
const SPAWN_GAP_SECS: u64 = 3;
const INFINITE_CHASE_PHASE: u32 = 3;
const DEATH_FRAMES: u32 = 11;
const TURN_BUFFER_MS: u64 = 150;
const INPUT_POLL_MS: u64 = 30;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    pub pacman_fps: u32,
    pub empowered_fps: u32,
    pub ghost_fps: u32,
    pub fleeing_fps: u32,
    pub captured_fps: u32,
    pub scatter_duration: Duration,
    pub chase_duration: Duration,
    pub power_duration: Duration,
    /// Warning window at the end of the power duration.
    pub flicker_duration: Duration,
    /// Idle delay between consecutive ghost releases.
    pub spawn_interval: Duration,
    /// Once a ghost reaches this phase it chases forever.
    pub chase_phase_limit: u32,
    pub death_frames: u32,
    /// How long a key press keeps steering the player.
    pub turn_buffer: Duration,
    pub input_poll: Duration,
    /// Multiplier applied to every tick interval.
    pub tick_scale: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            pacman_fps: DEFAULT_PACMAN_FPS,
            empowered_fps: DEFAULT_EMPOWERED_FPS,
            ghost_fps: DEFAULT_GHOST_FPS,
            fleeing_fps: DEFAULT_FLEEING_FPS,
            captured_fps: DEFAULT_CAPTURED_FPS,
            scatter_duration: Duration::from_secs(SCATTER_SECS),
            chase_duration: Duration::from_secs(CHASE_SECS),
            power_duration: Duration::from_secs(POWER_SECS),
            flicker_duration: Duration::from_secs(FLICKER_SECS),
            spawn_interval: Duration::from_secs(SPAWN_GAP_SECS),
            chase_phase_limit: INFINITE_CHASE_PHASE,
            death_frames: DEATH_FRAMES,
            turn_buffer: Duration::from_millis(TURN_BUFFER_MS),
            input_poll: Duration::from_millis(INPUT_POLL_MS),
            tick_scale: 1.0,
        }
    }
}

impl Tuning {
    /// Defaults with `PACMAN_TIME_SCALE` applied.
    pub fn from_env() -> Self {
        let raw = std::env::var("PACMAN_TIME_SCALE").ok();
        Self::default().scaled(parse_time_scale(raw.as_deref()))
    }

    /// Every duration and tick interval multiplied by `factor`, which is
    /// clamped to `MIN_TIME_SCALE..=MAX_TIME_SCALE`.
    pub fn scaled(self, factor: f64) -> Self {
        let factor = if factor.is_nan() {
            1.0
        } else {
            factor.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE)
        };
        let scale = |d: Duration| saturating_secs(d.as_secs_f64() * factor);
        Self {
            scatter_duration: scale(self.scatter_duration),
            chase_duration: scale(self.chase_duration),
            power_duration: scale(self.power_duration),
            flicker_duration: scale(self.flicker_duration),
            spawn_interval: scale(self.spawn_interval),
            turn_buffer: scale(self.turn_buffer),
            input_poll: scale(self.input_poll),
            tick_scale: self.tick_scale * factor,
            ..self
        }
    }

    /// Sleep between two ticks of an entity running at `fps`.
    pub fn tick_interval(&self, fps: u32) -> Duration {
        saturating_secs(self.tick_scale / f64::from(fps.max(1)))
    }

    /// Time a fleeing ghost spends before it starts flickering.
    pub fn fleeing_duration(&self) -> Duration {
        self.power_duration.saturating_sub(self.flicker_duration)
    }
}

/// Reads a time scale. Unset means 1.0; garbage or out-of-range values fall
/// back to 1.0 with a warning.
pub fn parse_time_scale(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 1.0;
    };
    match raw.trim().parse::<f64>() {
        Ok(scale) if (MIN_TIME_SCALE..=MAX_TIME_SCALE).contains(&scale) => scale,
        _ => {
            warn!(
                value = raw,
                min = MIN_TIME_SCALE,
                max = MAX_TIME_SCALE,
                "ignoring PACMAN_TIME_SCALE"
            );
            1.0
        }
    }
}

fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intervals_follow_frame_rates() {
        let tuning = Tuning::default();
        assert_eq!(tuning.tick_interval(tuning.captured_fps), Duration::from_secs_f64(1.0 / 12.0));
        assert_eq!(tuning.tick_interval(tuning.pacman_fps), tuning.tick_interval(tuning.ghost_fps));
        assert!(tuning.tick_interval(tuning.empowered_fps) < tuning.tick_interval(tuning.pacman_fps));
        assert!(tuning.tick_interval(tuning.fleeing_fps) > tuning.tick_interval(tuning.ghost_fps));
    }

    #[test]
    fn scaling_shrinks_durations_and_ticks() {
        let close = |d: Duration, secs: f64| (d.as_secs_f64() - secs).abs() < 1e-6;
        let tuning = Tuning::default().scaled(0.1);
        assert!(close(tuning.scatter_duration, 0.7));
        assert!(close(tuning.turn_buffer, 0.015));
        assert!(close(tuning.tick_interval(10), 0.01));
    }

    #[test]
    fn fleeing_leaves_room_for_the_flicker_window() {
        let tuning = Tuning::default();
        assert_eq!(tuning.fleeing_duration(), Duration::from_secs(5));
        let short = Tuning {
            power_duration: Duration::from_secs(1),
            ..Tuning::default()
        };
        assert_eq!(short.fleeing_duration(), Duration::ZERO);
    }

    #[test]
    fn time_scale_outside_the_range_falls_back() {
        assert_eq!(parse_time_scale(None), 1.0);
        assert_eq!(parse_time_scale(Some("0.5")), 0.5);
        assert_eq!(parse_time_scale(Some(" 2 ")), 2.0);
        assert_eq!(parse_time_scale(Some("1e20")), 1.0);
        assert_eq!(parse_time_scale(Some("inf")), 1.0);
        assert_eq!(parse_time_scale(Some("NaN")), 1.0);
        assert_eq!(parse_time_scale(Some("-3")), 1.0);
        assert_eq!(parse_time_scale(Some("0")), 1.0);
        assert_eq!(parse_time_scale(Some("fast")), 1.0);
    }

    #[test]
    fn huge_scale_is_clamped_instead_of_overflowing() {
        let tuning = Tuning::default().scaled(1e20);
        assert_eq!(tuning.tick_scale, MAX_TIME_SCALE);
        assert_eq!(tuning.chase_duration, Duration::from_secs(CHASE_SECS * 100));
        assert!(tuning.tick_interval(1) <= Duration::from_secs(100));

        let runaway = Tuning {
            tick_scale: 1e300,
            ..Tuning::default()
        };
        assert_eq!(runaway.tick_interval(1), Duration::MAX);
    }

    #[test]
    fn zero_fps_does_not_divide_by_zero() {
        let tuning = Tuning::default();
        assert_eq!(tuning.tick_interval(0), Duration::from_secs(1));
    }
}
