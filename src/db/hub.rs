//! In-process change notifications for live subscriptions.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Buffered events per collection before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// A committed write touching one or more documents of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: String,
    pub ids: Vec<String>,
}

impl ChangeEvent {
    pub fn touches(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }
}

/// Fans change events out to every feed watching a collection.
///
/// Registration is synchronous so a feed is listening before the call
/// that created it returns.
#[derive(Debug, Default)]
pub struct ChangeHub {
    channels: RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts receiving events for a collection.
    pub fn subscribe(&self, collection: &str) -> broadcast::Receiver<ChangeEvent> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publishes an event to the collection's watchers, if any.
    pub fn publish(&self, event: ChangeEvent) {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(sender) = channels.get(&event.collection) {
            // No receivers left is not an error
            let _ = sender.send(event);
        }
    }
}
