// src/guidance/signal.rs
// Cancellable sleep for the navigation loop. The loop parks in
// `recv_timeout` on a channel whose sender is dropped on stop, so a stop
// request wakes it at once.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One-shot stop request shared between a worker and its owner
#[derive(Debug)]
pub struct StopSignal {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        let (tx, rx) = bounded(0);
        StopSignal {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }
}

impl StopSignal {
    /// Create an un-triggered signal
    pub fn new() -> Self {
        StopSignal::default()
    }

    /// Request a stop and wake every waiter
    pub fn stop(&self) {
        // Disconnecting the channel is the stop; it stays observable afterwards
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for up to `timeout`, returning early with `true` on stop
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }
}
