//! Observable settings store consumed by the extension manager.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ExtensionError;

/// Settings keys the extension manager reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingsKey {
    /// String list of user-enabled extension ids.
    EnabledExtensions,
    /// String list of explicitly disabled extension ids. Wins over the enabled list.
    DisabledExtensions,
    /// Boolean: ignore the user's enabled list entirely.
    DisableUserExtensions,
    /// Boolean: skip the shell-version compatibility check.
    DisableVersionValidation,
}

impl SettingsKey {
    /// Every key, in declaration order.
    pub const ALL: [SettingsKey; 4] = [
        Self::EnabledExtensions,
        Self::DisabledExtensions,
        Self::DisableUserExtensions,
        Self::DisableVersionValidation,
    ];

    /// Returns the persisted name of this key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnabledExtensions => "enabled-extensions",
            Self::DisabledExtensions => "disabled-extensions",
            Self::DisableUserExtensions => "disable-user-extensions",
            Self::DisableVersionValidation => "disable-extension-version-validation",
        }
    }
}

impl std::fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Change notification emitted by a settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsChange {
    /// The value of a key changed.
    Changed(SettingsKey),
    /// The writability of a key changed.
    WritableChanged(SettingsKey),
}

/// Persisted extension settings with typed accessors and a change stream.
///
/// The manager treats the store purely as input; it only writes through
/// the two list setters.
#[async_trait]
pub trait SettingsStore: Send + Sync + std::fmt::Debug + 'static {
    /// Ids the user enabled.
    async fn enabled_extensions(&self) -> Vec<String>;

    /// Ids explicitly disabled.
    async fn disabled_extensions(&self) -> Vec<String>;

    /// Whether user extensions are globally disabled.
    async fn user_extensions_disabled(&self) -> bool;

    /// Whether the version compatibility check is disabled.
    async fn version_validation_disabled(&self) -> bool;

    /// Whether `key` may be written.
    async fn is_writable(&self, key: SettingsKey) -> bool;

    /// Replaces the enabled list.
    async fn set_enabled_extensions(&self, uuids: Vec<String>) -> Result<(), ExtensionError>;

    /// Replaces the disabled list.
    async fn set_disabled_extensions(&self, uuids: Vec<String>) -> Result<(), ExtensionError>;

    /// Subscribes to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<SettingsChange>;
}
