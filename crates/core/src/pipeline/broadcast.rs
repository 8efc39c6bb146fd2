use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};

use crate::shared::latest_channel::{latest_channel, LatestSender};

struct Listener<T> {
    tx: LatestSender<T>,
    alive: Arc<AtomicBool>,
}

/// Multicast of values to any number of slow or absent consumers.
///
/// Each subscriber has a single-slot mailbox: a consumer that falls behind
/// sees only the most recent value. Publishing never blocks, and publishing
/// with nobody subscribed is a no-op.
pub struct Broadcast<T> {
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T: Clone> Broadcast<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = latest_channel();
        let alive = Arc::new(AtomicBool::new(true));
        self.lock().push(Listener {
            tx,
            alive: alive.clone(),
        });
        Subscription { rx, alive }
    }

    /// True while at least one subscription is alive.
    pub fn is_active(&self) -> bool {
        self.subscriber_count() > 0
    }

    pub fn subscriber_count(&self) -> usize {
        let mut listeners = self.lock();
        prune(&mut listeners);
        listeners.len()
    }

    /// Delivers `value` to every live subscriber; returns how many.
    pub fn publish(&self, value: T) -> usize {
        let mut listeners = self.lock();
        prune(&mut listeners);
        for listener in listeners.iter() {
            listener.tx.send(value.clone());
        }
        listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Listener<T>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn prune<T>(listeners: &mut Vec<Listener<T>>) {
    listeners.retain(|l| l.alive.load(Ordering::Acquire));
}

/// Receiving end of a [`Broadcast`]. Dropping it unsubscribes.
///
/// Receives fail with a disconnection error once the broadcast itself has
/// been dropped and the mailbox is empty.
pub struct Subscription<T> {
    rx: Receiver<T>,
    alive: Arc<AtomicBool>,
}

impl<T> Subscription<T> {
    pub fn recv(&self) -> Result<T, RecvError> {
        self.rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.rx.try_recv()
    }

    /// The newest pending value, if any, without blocking.
    pub fn latest(&self) -> Option<T> {
        self.rx.try_iter().last()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}
