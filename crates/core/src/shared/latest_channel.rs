use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Producer half of a single-slot channel in which a new value replaces
/// one the consumer has not taken yet.
///
/// Sending never blocks. The producer keeps a receiver handle of its own so
/// it can evict the stale value; as a consequence the channel never reports
/// disconnection to the producer.
pub struct LatestSender<T> {
    tx: Sender<T>,
    evict: Receiver<T>,
}

/// Creates a latest-wins channel.
pub fn latest_channel<T>() -> (LatestSender<T>, Receiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        LatestSender {
            tx,
            evict: rx.clone(),
        },
        rx,
    )
}

impl<T> LatestSender<T> {
    /// Offers `value`, returning the stale value it displaced, if any.
    pub fn send(&self, value: T) -> Option<T> {
        let mut pending = value;
        let mut displaced = None;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return displaced,
                Err(TrySendError::Full(v)) => {
                    // The consumer may win the race for the stale value; just retry.
                    if let Ok(stale) = self.evict.try_recv() {
                        displaced = Some(stale);
                    }
                    pending = v;
                }
                Err(TrySendError::Disconnected(v)) => return Some(v),
            }
        }
    }
}
