use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::protocol::Notification;

/// Notifications queued per subscriber before new ones are dropped for it.
/// Each notification is a full snapshot, so a slow reader loses nothing but
/// intermediate states.
pub const SUBSCRIBER_QUEUE: usize = 32;

/// Fan-out of notifications to connected subscribers, built on flume.
///
/// Each [`subscribe`](Self::subscribe) creates a receiver that sees every
/// message published after it was created, up to [`SUBSCRIBER_QUEUE`]
/// undelivered messages. Cloning the bus is cheap.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Vec<flume::Sender<Arc<Notification>>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> flume::Receiver<Arc<Notification>> {
        let (tx, rx) = flume::bounded(SUBSCRIBER_QUEUE);
        self.senders().push(tx);
        rx
    }

    /// Publish to all current subscribers and prune the ones whose receivers
    /// were dropped. A subscriber with a full queue skips this message.
    /// Returns how many subscribers received the message.
    pub fn publish(&self, msg: Notification) -> usize {
        let msg = Arc::new(msg);
        let mut delivered = 0;
        let mut senders = self.senders();
        senders.retain(|tx| match tx.try_send(msg.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(flume::TrySendError::Full(_)) => {
                warn!("subscriber is not keeping up, dropping notification");
                true
            }
            Err(flume::TrySendError::Disconnected(_)) => false,
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders().len()
    }

    fn senders(&self) -> std::sync::MutexGuard<'_, Vec<flume::Sender<Arc<Notification>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
