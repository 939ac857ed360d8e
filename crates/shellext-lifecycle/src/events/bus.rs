//! Event bus with synchronous subscriber dispatch plus a broadcast channel
//! for async consumers.
//!
//! Subscribers are called in subscription order before `publish` returns.
//! The broadcast channel is best-effort: slow receivers lag, the manager
//! never waits on them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use shellext_core::events::{DomainEvent, ExtensionEvent};

use super::handler::ExtensionEventHandler;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Entry in the subscriber list.
#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn ExtensionEventHandler>,
}

/// Publishes lifecycle events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Subscribers in registration order.
    subscribers: RwLock<Vec<Subscription>>,
    /// Next subscription id.
    next_id: AtomicU64,
    /// Fan-out for async consumers.
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Creates a bus whose broadcast channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Registers a synchronous handler.
    pub async fn subscribe(&self, handler: Arc<dyn ExtensionEventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .await
            .push(Subscription { id, handler });
        id
    }

    /// Removes a handler. Returns whether it was registered.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Returns a receiver for every event published from now on.
    pub fn receiver(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to every subscriber, then to the channel.
    pub async fn publish(&self, payload: ExtensionEvent) {
        let event = DomainEvent::new(payload);

        let subscribers = self.subscribers.read().await;
        debug!(
            uuid = %event.payload.uuid(),
            subscriber_count = subscribers.len(),
            "Publishing extension event"
        );
        for subscription in subscribers.iter() {
            subscription.handler.handle(&event);
        }
        drop(subscribers);

        // no receivers is fine
        let _ = self.sender.send(event);
    }

    /// Returns the number of synchronous subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
