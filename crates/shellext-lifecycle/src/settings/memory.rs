//! In-memory settings store.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use shellext_core::error::ExtensionError;
use shellext_core::traits::{SettingsChange, SettingsKey, SettingsStore};

use super::SettingsValues;

/// Settings held in memory. Every key starts writable.
#[derive(Debug)]
pub struct MemorySettings {
    /// Current values.
    values: RwLock<SettingsValues>,
    /// Keys currently locked down.
    read_only: RwLock<HashSet<SettingsKey>>,
    /// Change notifications.
    sender: broadcast::Sender<SettingsChange>,
}

impl MemorySettings {
    /// Creates a store with default values.
    pub fn new() -> Self {
        Self::with_values(SettingsValues::default())
    }

    /// Creates a store with the given values.
    pub fn with_values(values: SettingsValues) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            values: RwLock::new(values),
            read_only: RwLock::new(HashSet::new()),
            sender,
        }
    }

    /// Snapshot of every value.
    pub async fn values(&self) -> SettingsValues {
        self.values.read().await.clone()
    }

    /// Changes the writability of a key and notifies subscribers.
    pub async fn set_writable(&self, key: SettingsKey, writable: bool) {
        let changed = {
            let mut read_only = self.read_only.write().await;
            if writable {
                read_only.remove(&key)
            } else {
                read_only.insert(key)
            }
        };
        if changed {
            self.notify(SettingsChange::WritableChanged(key));
        }
    }

    /// Sets `disable-user-extensions`.
    pub async fn set_user_extensions_disabled(&self, disabled: bool) {
        self.update(|v| v.disable_user_extensions = disabled).await;
    }

    /// Sets `disable-extension-version-validation`.
    pub async fn set_version_validation_disabled(&self, disabled: bool) {
        self.update(|v| v.disable_extension_version_validation = disabled)
            .await;
    }

    /// Applies `change` and notifies subscribers of every key it touched.
    async fn update(&self, change: impl FnOnce(&mut SettingsValues)) {
        let keys = {
            let mut values = self.values.write().await;
            let before = values.clone();
            change(&mut values);
            before.changed_keys(&values)
        };
        for key in keys {
            self.notify(SettingsChange::Changed(key));
        }
    }

    async fn check_writable(&self, key: SettingsKey) -> Result<(), ExtensionError> {
        if self.read_only.read().await.contains(&key) {
            return Err(ExtensionError::Settings(format!("{key} is not writable")));
        }
        Ok(())
    }

    fn notify(&self, change: SettingsChange) {
        debug!(change = ?change, "Settings changed");
        // no subscribers is fine
        let _ = self.sender.send(change);
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn enabled_extensions(&self) -> Vec<String> {
        self.values.read().await.enabled_extensions.clone()
    }

    async fn disabled_extensions(&self) -> Vec<String> {
        self.values.read().await.disabled_extensions.clone()
    }

    async fn user_extensions_disabled(&self) -> bool {
        self.values.read().await.disable_user_extensions
    }

    async fn version_validation_disabled(&self) -> bool {
        self.values.read().await.disable_extension_version_validation
    }

    async fn is_writable(&self, key: SettingsKey) -> bool {
        !self.read_only.read().await.contains(&key)
    }

    async fn set_enabled_extensions(&self, uuids: Vec<String>) -> Result<(), ExtensionError> {
        self.check_writable(SettingsKey::EnabledExtensions).await?;
        self.update(|v| v.enabled_extensions = uuids).await;
        Ok(())
    }

    async fn set_disabled_extensions(&self, uuids: Vec<String>) -> Result<(), ExtensionError> {
        self.check_writable(SettingsKey::DisabledExtensions).await?;
        self.update(|v| v.disabled_extensions = uuids).await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.sender.subscribe()
    }
}
