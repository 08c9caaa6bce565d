//! Buffered directional input.
//!
//! A sampler thread polls a [`KeySource`] and stamps the last pressed
//! direction into an [`InputLatch`]. The player loop reads the latch on its
//! own, slower schedule, so a turn pressed slightly before an intersection is
//! still honored when the player gets there.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::actor::CancelToken;
use crate::components::Dir;
use crate::error::{LevelError, LevelResult};

const CODE_BITS: u64 = 3;
const CODE_MASK: u64 = (1 << CODE_BITS) - 1;

/// Anything that can report the direction currently being pressed.
pub trait KeySource: Send {
    fn poll(&mut self) -> Option<Dir>;
}

/// Last pressed direction and when it was pressed, packed in one atomic word.
#[derive(Debug)]
pub struct InputLatch {
    origin: Instant,
    packed: AtomicU64,
}

impl Default for InputLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl InputLatch {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            packed: AtomicU64::new(0),
        }
    }

    pub fn press(&self, dir: Dir) {
        self.press_at(dir, Instant::now());
    }

    pub fn press_at(&self, dir: Dir, at: Instant) {
        // +1 keeps a press at the origin instant distinct from "never pressed".
        let stamp = at.saturating_duration_since(self.origin).as_millis() as u64 + 1;
        let word = (stamp << CODE_BITS) | u64::from(dir.code());
        self.packed.store(word, Ordering::Release);
    }

    /// The last direction pressed no more than `window` before `now`.
    pub fn recent(&self, now: Instant, window: Duration) -> Option<Dir> {
        let word = self.packed.load(Ordering::Acquire);
        if word == 0 {
            return None;
        }
        let dir = Dir::from_code((word & CODE_MASK) as u8);
        if dir == Dir::Static {
            return None;
        }
        let pressed_ms = (word >> CODE_BITS) - 1;
        let now_ms = now.saturating_duration_since(self.origin).as_millis() as u64;
        if now_ms.saturating_sub(pressed_ms) <= window.as_millis() as u64 {
            Some(dir)
        } else {
            None
        }
    }
}

/// Polls `source` every `period` until `cancel` fires.
pub fn spawn_sampler(
    mut source: Box<dyn KeySource>,
    latch: Arc<InputLatch>,
    period: Duration,
    cancel: CancelToken,
) -> LevelResult<JoinHandle<()>> {
    let name = "input-sampler".to_string();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            debug!("input sampler started");
            loop {
                if let Some(dir) = source.poll() {
                    trace!(?dir, "key pressed");
                    latch.press(dir);
                }
                if cancel.sleep(period) {
                    break;
                }
            }
            debug!("input sampler stopped");
        })
        .map_err(|source| LevelError::Spawn { name, source })
}

/// Replays a fixed list of presses, one per poll, then goes quiet.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    presses: VecDeque<Option<Dir>>,
}

impl ScriptedKeys {
    pub fn new<I>(presses: I) -> Self
    where
        I: IntoIterator<Item = Option<Dir>>,
    {
        Self {
            presses: presses.into_iter().collect(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self) -> Option<Dir> {
        self.presses.pop_front().flatten()
    }
}

/// Presses the same direction on every poll.
#[derive(Clone, Copy, Debug)]
pub struct HeldKey(pub Dir);

impl KeySource for HeldKey {
    fn poll(&mut self) -> Option<Dir> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_latch_reports_nothing() {
        let latch = InputLatch::new();
        assert_eq!(latch.recent(Instant::now(), Duration::from_secs(10)), None);
    }

    #[test]
    fn press_expires_after_window() {
        let latch = InputLatch::new();
        let t0 = Instant::now();
        latch.press_at(Dir::Left, t0);
        let window = Duration::from_millis(150);
        assert_eq!(latch.recent(t0, window), Some(Dir::Left));
        assert_eq!(latch.recent(t0 + Duration::from_millis(150), window), Some(Dir::Left));
        assert_eq!(latch.recent(t0 + Duration::from_millis(151), window), None);
    }

    #[test]
    fn latest_press_wins() {
        let latch = InputLatch::new();
        let t0 = Instant::now();
        latch.press_at(Dir::Up, t0);
        latch.press_at(Dir::Right, t0 + Duration::from_millis(20));
        assert_eq!(
            latch.recent(t0 + Duration::from_millis(40), Duration::from_millis(150)),
            Some(Dir::Right)
        );
    }

    #[test]
    fn static_press_is_ignored() {
        let latch = InputLatch::new();
        latch.press(Dir::Static);
        assert_eq!(latch.recent(Instant::now(), Duration::from_secs(1)), None);
    }

    #[test]
    fn sampler_fills_latch_and_stops_on_cancel() {
        let latch = Arc::new(InputLatch::new());
        let cancel = CancelToken::new();
        let keys = Box::new(ScriptedKeys::new([None, Some(Dir::Down)]));
        let handle =
            spawn_sampler(keys, Arc::clone(&latch), Duration::from_millis(5), cancel.clone())
                .unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while latch.recent(Instant::now(), Duration::from_secs(5)).is_none()
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(latch.recent(Instant::now(), Duration::from_secs(5)), Some(Dir::Down));
        cancel.cancel();
        handle.join().unwrap();
    }
}
