//! Lifecycle events emitted by the extension manager.
//!
//! Events are published through the lifecycle event bus and consumed by
//! UI collaborators, the host's logging subscriber, and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ExtensionInfo;

/// Wrapper for every lifecycle event with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub payload: ExtensionEvent,
}

impl DomainEvent {
    /// Create a new domain event.
    pub fn new(payload: ExtensionEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Extension lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtensionEvent {
    /// A record was created, or its module was imported.
    Loaded {
        /// Extension id.
        uuid: String,
    },
    /// A record completed a state transition or its `enabled` flag flipped.
    StateChanged {
        /// Snapshot after the change.
        extension: ExtensionInfo,
    },
}

impl ExtensionEvent {
    /// The extension id this event concerns.
    pub fn uuid(&self) -> &str {
        match self {
            Self::Loaded { uuid } => uuid,
            Self::StateChanged { extension } => &extension.uuid,
        }
    }
}
