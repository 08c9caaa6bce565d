//! Rendezvous channels between the entity loops and the level orchestrator.
//!
//! Every channel has zero capacity: a send blocks until the orchestrator has
//! picked the signal up. Once the orchestrator goes away its receivers are
//! dropped and every pending or future send fails instead of blocking.

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

/// Something an entity reports upward while ticking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    EatPellet { power: bool },
    PowerWearOff,
    PhaseChange(u32),
    RemoveEnemies,
    EndGame,
}

/// Sending half, cloned into every entity loop.
#[derive(Clone, Debug)]
pub struct Broker {
    eat_pellet: Sender<bool>,
    power_wear_off: Sender<()>,
    phase_change: Sender<u32>,
    remove_enemies: Sender<()>,
    end_game: Sender<()>,
}

/// Receiving half, owned by the orchestrator.
#[derive(Debug)]
pub struct Inbox {
    pub eat_pellet: Receiver<bool>,
    pub power_wear_off: Receiver<()>,
    pub phase_change: Receiver<u32>,
    pub remove_enemies: Receiver<()>,
    pub end_game: Receiver<()>,
}

pub fn channel() -> (Broker, Inbox) {
    let (eat_tx, eat_rx) = bounded(0);
    let (wear_tx, wear_rx) = bounded(0);
    let (phase_tx, phase_rx) = bounded(0);
    let (remove_tx, remove_rx) = bounded(0);
    let (end_tx, end_rx) = bounded(0);
    (
        Broker {
            eat_pellet: eat_tx,
            power_wear_off: wear_tx,
            phase_change: phase_tx,
            remove_enemies: remove_tx,
            end_game: end_tx,
        },
        Inbox {
            eat_pellet: eat_rx,
            power_wear_off: wear_rx,
            phase_change: phase_rx,
            remove_enemies: remove_rx,
            end_game: end_rx,
        },
    )
}

impl Broker {
    /// Blocks until the orchestrator receives `signal`. Returns `false` when
    /// nobody is listening anymore.
    pub fn send(&self, signal: Signal) -> bool {
        let delivered = match signal {
            Signal::EatPellet { power } => self.eat_pellet.send(power).is_ok(),
            Signal::PowerWearOff => self.power_wear_off.send(()).is_ok(),
            Signal::PhaseChange(phase) => self.phase_change.send(phase).is_ok(),
            Signal::RemoveEnemies => self.remove_enemies.send(()).is_ok(),
            Signal::EndGame => self.end_game.send(()).is_ok(),
        };
        if !delivered {
            debug!(?signal, "orchestrator gone, signal dropped");
        }
        delivered
    }
}

/// Signals raised while an entity holds its own state lock. They are
/// delivered with [`Outbox::flush`] once that lock is released.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Signal>,
}

impl Outbox {
    pub fn push(&mut self, signal: Signal) {
        self.pending.push(signal);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Signal] {
        &self.pending
    }

    /// Sends everything in order, stopping at the first signal nobody receives.
    pub fn flush(&mut self, broker: &Broker) {
        for signal in self.pending.drain(..) {
            if !broker.send(signal) {
                break;
            }
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn send_blocks_until_received() {
        let (broker, inbox) = channel();
        let sender = thread::spawn(move || broker.send(Signal::PhaseChange(2)));
        thread::sleep(Duration::from_millis(20));
        assert!(!sender.is_finished());
        assert_eq!(inbox.phase_change.recv_timeout(Duration::from_secs(1)), Ok(2));
        assert!(sender.join().unwrap());
    }

    #[test]
    fn send_fails_once_inbox_is_dropped() {
        let (broker, inbox) = channel();
        drop(inbox);
        assert!(!broker.send(Signal::EndGame));
        assert!(!broker.send(Signal::EatPellet { power: true }));
    }

    #[test]
    fn outbox_flushes_in_order() {
        let (broker, inbox) = channel();
        let mut outbox = Outbox::default();
        outbox.push(Signal::EatPellet { power: false });
        outbox.push(Signal::RemoveEnemies);
        let flusher = thread::spawn(move || {
            outbox.flush(&broker);
            outbox.is_empty()
        });
        assert_eq!(inbox.eat_pellet.recv_timeout(Duration::from_secs(1)), Ok(false));
        assert_eq!(inbox.remove_enemies.recv_timeout(Duration::from_secs(1)), Ok(()));
        assert!(flusher.join().unwrap());
    }

    #[test]
    fn outbox_drops_the_rest_when_nobody_listens() {
        let (broker, inbox) = channel();
        drop(inbox);
        let mut outbox = Outbox::default();
        outbox.push(Signal::PowerWearOff);
        outbox.push(Signal::EndGame);
        outbox.flush(&broker);
        assert!(outbox.is_empty());
    }
}
