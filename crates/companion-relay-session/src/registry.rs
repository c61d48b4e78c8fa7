//! Process-wide registry of named event subscriptions.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use companion_relay_core::SessionEvent;
use uuid::Uuid;

/// Subscription identifier, returned by `subscribe`.
pub type SubscriptionId = Uuid;

/// Handler invoked for each delivered event.
///
/// Runs on the delivery path from the transport, so handlers must not
/// block indefinitely.
pub type EventHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    handler: EventHandler,
}

/// Named event subscriptions with snapshot delivery.
///
/// `emit` delivers to a snapshot of the subscribers registered for the
/// event's name at dispatch start, in subscription order. Subscribing or
/// unsubscribing concurrently with an in-flight `emit` is safe: a
/// listener removed before dispatch never fires, one removed during the
/// current dispatch may still receive that event.
#[derive(Default)]
pub struct ListenerRegistry {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to an event name.
    ///
    /// Unknown names are legal; they simply never fire unless the
    /// normalizer emits them.
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.subscribers
            .write()
            .unwrap()
            .entry(event_name.into())
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap();
        for list in subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove every subscription for an event name, returning how many
    /// were removed.
    pub fn remove_all(&self, event_name: &str) -> usize {
        self.subscribers
            .write()
            .unwrap()
            .remove(event_name)
            .map_or(0, |list| list.len())
    }

    /// Number of current subscribers for an event name.
    #[must_use]
    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.subscribers
            .read()
            .unwrap()
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Deliver an event to all current subscribers of its name.
    pub fn emit(&self, event: &SessionEvent) {
        // Snapshot before iterating so handlers may subscribe/unsubscribe
        // without holding up or corrupting this dispatch.
        let snapshot: Vec<Subscriber> = {
            let subscribers = self.subscribers.read().unwrap();
            subscribers.get(event.name()).cloned().unwrap_or_default()
        };

        for subscriber in snapshot {
            (subscriber.handler)(event);
        }
    }
}
