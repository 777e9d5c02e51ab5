//! Fan-out of progress text to attached observers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Identifier handed out by [`ProgressBroadcaster::subscribe`].
pub type SubscriberId = u64;

/// Maintains the set of open subscriber connections and fans progress text
/// out to all of them.
///
/// Delivery is at-most-once and best-effort: a subscriber whose channel is
/// gone is pruned, and its failure neither blocks nor fails delivery to the
/// others. There is no replay buffer; a subscriber sees only events emitted
/// after it attached.
#[derive(Debug, Default)]
pub struct ProgressBroadcaster {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl ProgressBroadcaster {
    /// Creates a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new subscriber, returning its id and the receiving end of
    /// its delivery channel.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(id, tx);
        debug!(subscriber = id, "progress subscriber attached");
        (id, rx)
    }

    /// Detaches a subscriber. Detaching an unknown id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.lock().remove(&id).is_some() {
            debug!(subscriber = id, "progress subscriber detached");
        }
    }

    /// Delivers `text` to every currently-attached subscriber.
    ///
    /// The subscriber set is snapshotted before iteration so a removal that
    /// races with the broadcast can neither skip nor duplicate delivery to
    /// the others. Subscribers whose receiving end has been dropped are
    /// pruned afterwards.
    pub fn broadcast(&self, text: &str) {
        let snapshot: Vec<(SubscriberId, mpsc::UnboundedSender<String>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut stale = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(text.to_string()).is_err() {
                stale.push(id);
            }
        }

        if !stale.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in stale {
                subscribers.remove(&id);
                debug!(subscriber = id, "pruned disconnected subscriber");
            }
        }
    }

    /// The number of currently-attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_broadcast() {
        let broadcaster = ProgressBroadcaster::new();
        let (_id, mut rx) = broadcaster.subscribe();

        broadcaster.broadcast("Progress: 10%");

        assert_eq!(rx.recv().await, Some("Progress: 10%".to_string()));
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let broadcaster = ProgressBroadcaster::new();
        broadcaster.broadcast("before attach");

        let (_id, mut rx) = broadcaster.subscribe();
        broadcaster.broadcast("after attach");

        assert_eq!(rx.recv().await, Some("after attach".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_subscriber_does_not_block_others() {
        let broadcaster = ProgressBroadcaster::new();
        let (_dead, dead_rx) = broadcaster.subscribe();
        let (_live, mut live_rx) = broadcaster.subscribe();
        drop(dead_rx);

        broadcaster.broadcast("still delivered");

        assert_eq!(live_rx.recv().await, Some("still delivered".to_string()));
        // The dead subscriber was pruned during the broadcast.
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let broadcaster = ProgressBroadcaster::new();
        let (id, _rx) = broadcaster.subscribe();

        broadcaster.unsubscribe(id);
        broadcaster.unsubscribe(id);

        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let broadcaster = ProgressBroadcaster::new();
        let (_a, mut rx_a) = broadcaster.subscribe();
        let (_b, mut rx_b) = broadcaster.subscribe();

        broadcaster.broadcast("fan-out");

        assert_eq!(rx_a.recv().await, Some("fan-out".to_string()));
        assert_eq!(rx_b.recv().await, Some("fan-out".to_string()));
    }
}
