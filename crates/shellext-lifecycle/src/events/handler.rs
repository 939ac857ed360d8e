//! Subscriber trait and a closure adapter.

use std::sync::Arc;

use shellext_core::events::DomainEvent;

/// Receives lifecycle events synchronously, in publication order.
pub trait ExtensionEventHandler: Send + Sync + std::fmt::Debug {
    /// Handles one event. Must not block.
    fn handle(&self, event: &DomainEvent);
}

/// A closure-based handler for quick subscriptions.
pub struct ClosureHandler {
    /// Label used in logs.
    name: String,
    /// Handler function.
    handler: Arc<dyn Fn(&DomainEvent) + Send + Sync>,
}

impl std::fmt::Debug for ClosureHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureHandler")
            .field("name", &self.name)
            .field("handler", &"<closure>")
            .finish()
    }
}

impl ClosureHandler {
    /// Creates a new closure-based handler.
    pub fn new<F>(name: &str, handler: F) -> Self
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            handler: Arc::new(handler),
        }
    }

    /// Wraps a closure into an `Arc<dyn ExtensionEventHandler>`.
    pub fn wrap<F>(name: &str, handler: F) -> Arc<dyn ExtensionEventHandler>
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, handler))
    }
}

impl ExtensionEventHandler for ClosureHandler {
    fn handle(&self, event: &DomainEvent) {
        (self.handler)(event)
    }
}
