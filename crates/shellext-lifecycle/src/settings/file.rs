//! JSON-file settings store.
//!
//! The file is the source of truth. [`FileSettings::reload`] re-reads it and
//! notifies subscribers of every key whose value changed since the last
//! read, so an external editor (the `shellext` CLI, for one) drives the
//! running host.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use shellext_core::error::ExtensionError;
use shellext_core::result::AppResult;
use shellext_core::traits::{SettingsChange, SettingsKey, SettingsStore};

use super::SettingsValues;

/// Settings persisted as a JSON object with kebab-case keys.
#[derive(Debug)]
pub struct FileSettings {
    /// Settings file path.
    path: PathBuf,
    /// When set, every key is read-only.
    read_only: AtomicBool,
    /// Values as of the last read or write.
    cached: RwLock<SettingsValues>,
    /// Change notifications.
    sender: broadcast::Sender<SettingsChange>,
}

impl FileSettings {
    /// Opens the settings file. A missing file reads as defaults.
    pub async fn open(path: impl Into<PathBuf>, read_only: bool) -> AppResult<Self> {
        let path = path.into();
        let values = read_values(&path).await?;
        let (sender, _) = broadcast::channel(64);

        info!(path = %path.display(), read_only, "Settings file opened");

        Ok(Self {
            path,
            read_only: AtomicBool::new(read_only),
            cached: RwLock::new(values),
            sender,
        })
    }

    /// Settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file and notifies subscribers of changed keys.
    ///
    /// Returns the keys that changed.
    pub async fn reload(&self) -> AppResult<Vec<SettingsKey>> {
        let fresh = read_values(&self.path).await?;

        let keys = {
            let mut cached = self.cached.write().await;
            let keys = cached.changed_keys(&fresh);
            *cached = fresh;
            keys
        };

        for key in &keys {
            self.notify(SettingsChange::Changed(*key));
        }
        Ok(keys)
    }

    /// Locks or unlocks every key and notifies subscribers.
    pub fn set_read_only(&self, read_only: bool) {
        if self.read_only.swap(read_only, Ordering::SeqCst) != read_only {
            for key in SettingsKey::ALL {
                self.notify(SettingsChange::WritableChanged(key));
            }
        }
    }

    /// Snapshot of every value as last read.
    pub async fn values(&self) -> SettingsValues {
        self.cached.read().await.clone()
    }

    async fn write_with(
        &self,
        key: SettingsKey,
        change: impl FnOnce(&mut SettingsValues),
    ) -> Result<(), ExtensionError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(ExtensionError::Settings(format!("{key} is not writable")));
        }

        let keys = {
            let mut cached = self.cached.write().await;
            let mut next = cached.clone();
            change(&mut next);
            let keys = cached.changed_keys(&next);
            if keys.is_empty() {
                return Ok(());
            }

            write_values(&self.path, &next).await?;
            *cached = next;
            keys
        };

        for key in keys {
            self.notify(SettingsChange::Changed(key));
        }
        Ok(())
    }

    fn notify(&self, change: SettingsChange) {
        debug!(change = ?change, path = %self.path.display(), "Settings changed");
        // no subscribers is fine
        let _ = self.sender.send(change);
    }
}

/// Reads settings from `path`; a missing file yields defaults.
pub async fn read_values(path: &Path) -> AppResult<SettingsValues> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Settings file missing, using defaults");
            Ok(SettingsValues::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Writes settings to `path`, creating parent directories as needed.
pub async fn write_values(path: &Path, values: &SettingsValues) -> Result<(), ExtensionError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let json = serde_json::to_string_pretty(values).map_err(|e| {
        ExtensionError::Settings(format!("failed to serialize settings: {e}"))
    })?;
    tokio::fs::write(path, json).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to write settings file");
        ExtensionError::from(e)
    })
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn enabled_extensions(&self) -> Vec<String> {
        self.cached.read().await.enabled_extensions.clone()
    }

    async fn disabled_extensions(&self) -> Vec<String> {
        self.cached.read().await.disabled_extensions.clone()
    }

    async fn user_extensions_disabled(&self) -> bool {
        self.cached.read().await.disable_user_extensions
    }

    async fn version_validation_disabled(&self) -> bool {
        self.cached.read().await.disable_extension_version_validation
    }

    async fn is_writable(&self, _key: SettingsKey) -> bool {
        !self.read_only.load(Ordering::SeqCst)
    }

    async fn set_enabled_extensions(&self, uuids: Vec<String>) -> Result<(), ExtensionError> {
        self.write_with(SettingsKey::EnabledExtensions, |v| {
            v.enabled_extensions = uuids
        })
        .await
    }

    async fn set_disabled_extensions(&self, uuids: Vec<String>) -> Result<(), ExtensionError> {
        self.write_with(SettingsKey::DisabledExtensions, |v| {
            v.disabled_extensions = uuids
        })
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.sender.subscribe()
    }
}
