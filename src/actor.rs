//! Per-entity control loops.
//!
//! Every entity runs on its own named thread. Each tick takes the grid lock,
//! lets the entity act, delivers whatever it signalled and releases the
//! lock, then sleeps for an interval that depends on the entity's current
//! state.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::broker::{Broker, Outbox};
use crate::config::Tuning;
use crate::error::{LevelError, LevelResult};
use crate::world::{TickContext, World};

/// Cooperative cancellation shared by every loop of a level.
///
/// Cancelling drops the only sender, which disconnects every clone of the
/// receiver at once. Sleeping loops wake immediately.
#[derive(Clone, Debug)]
pub struct CancelToken {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    pub fn cancel(&self) {
        self.trigger.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleeps for `duration`. Returns `true` if the token was cancelled
    /// before or while sleeping.
    pub fn sleep(&self, duration: Duration) -> bool {
        matches!(
            self.signal.recv_timeout(duration),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Becomes ready (disconnected) on cancel, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.signal
    }
}

/// What the loop should do after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// An entity driven by its own control loop.
pub trait Actor: Send + Sync + 'static {
    fn name(&self) -> String;

    /// Sleep until the next tick, derived from the current state.
    fn tick_interval(&self, tuning: &Tuning) -> Duration;

    /// Acts once. Called with the grid locked.
    fn tick(&self, ctx: &mut TickContext<'_>) -> Flow;
}

/// Starts `actor`'s control loop on a dedicated thread.
pub fn spawn<A: Actor>(
    actor: Arc<A>,
    world: Arc<World>,
    broker: Broker,
    cancel: CancelToken,
) -> LevelResult<JoinHandle<()>> {
    let name = actor.name();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_loop(actor.as_ref(), &world, &broker, &cancel))
        .map_err(|source| LevelError::Spawn { name, source })
}

fn run_loop<A: Actor>(actor: &A, world: &World, broker: &Broker, cancel: &CancelToken) {
    debug!(actor = %actor.name(), "control loop started");
    let mut ticks = 0u64;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let flow = {
            let mut grid = world.lock_grid();
            let mut outbox = Outbox::default();
            let flow = actor.tick(&mut TickContext {
                grid: &mut *grid,
                world,
                outbox: &mut outbox,
                now: Instant::now(),
            });
            outbox.flush(broker);
            flow
        };
        ticks += 1;
        trace!(actor = %actor.name(), ticks, ?flow, "tick");
        if flow == Flow::Halt {
            break;
        }
        if cancel.sleep(actor.tick_interval(world.tuning())) {
            break;
        }
    }
    debug!(actor = %actor.name(), ticks, "control loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_runs_full_duration_when_not_cancelled() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_sleepers_in_every_clone() {
        let token = CancelToken::new();
        let sleeper = {
            let token = token.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let cancelled = token.sleep(Duration::from_secs(10));
                (cancelled, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let (cancelled, slept) = sleeper.join().unwrap();
        assert!(cancelled);
        assert!(slept < Duration::from_secs(5));
        assert!(token.is_cancelled());
        assert!(token.sleep(Duration::from_secs(10)));
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}
