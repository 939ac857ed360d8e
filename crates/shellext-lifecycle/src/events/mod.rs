//! Event sink for lifecycle notifications.

pub mod bus;
pub mod handler;

pub use bus::{EventBus, SubscriptionId};
pub use handler::{ClosureHandler, ExtensionEventHandler};
