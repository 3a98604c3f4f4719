//! Per-collection fan-out of change events to in-process subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::store::Resource;

/// What happened to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
        }
    }
}

/// A change notification for one row.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub action: Action,
    pub id: String,
    pub data: Resource,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
}

/// Non-blocking publish/subscribe hub keyed by collection name.
///
/// Each subscriber is a bounded channel. Publishing never waits: a
/// subscriber with a full buffer misses that event (other subscribers still
/// receive it), and a subscriber whose receiver was dropped is pruned on the
/// next publish. Loss is acceptable because clients reconcile by re-reading.
#[derive(Default)]
pub struct Broker {
    channels: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Broker {
    pub fn new() -> Broker {
        Broker::default()
    }

    /// Register a subscriber for `collection` with the given buffer
    /// capacity. The returned id is the handle for [`unsubscribe`]; simply
    /// dropping the receiver has the same effect at the next publish.
    ///
    /// [`unsubscribe`]: Broker::unsubscribe
    pub fn subscribe(&self, collection: &str, capacity: usize) -> (u64, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        (id, rx)
    }

    /// Remove a subscriber registered with [`subscribe`](Broker::subscribe).
    pub fn unsubscribe(&self, collection: &str, id: u64) {
        let mut channels = self.channels.write();
        if let Some(subscribers) = channels.get_mut(collection) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                channels.remove(collection);
            }
        }
    }

    /// Deliver `event` to every current subscriber of `collection` without
    /// blocking. Publish happens after the corresponding write, so a
    /// subscriber observing an event can immediately read the written row.
    pub fn publish(&self, collection: &str, event: Event) {
        let mut any_closed = false;
        {
            let channels = self.channels.read();
            let Some(subscribers) = channels.get(collection) else {
                return;
            };
            for subscriber in subscribers {
                match subscriber.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    // Slow consumer: this subscriber misses the event.
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => any_closed = true,
                }
            }
        }
        if any_closed {
            let mut channels = self.channels.write();
            if let Some(subscribers) = channels.get_mut(collection) {
                subscribers.retain(|s| !s.tx.is_closed());
                if subscribers.is_empty() {
                    channels.remove(collection);
                }
            }
        }
    }

    /// Number of registered subscribers for `collection`.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.channels
            .read()
            .get(collection)
            .map_or(0, |subscribers| subscribers.len())
    }
}
