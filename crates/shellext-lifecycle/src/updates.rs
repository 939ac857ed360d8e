//! Staged extension updates and the major-version marker.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use shellext_core::result::AppResult;
use shellext_core::traits::{UpdateSource, UpgradeMarker};

/// Updates downloaded into a staging directory, one subdirectory per id.
///
/// Installing an update replaces `<user_dir>/<uuid>` with
/// `<updates_dir>/<uuid>`.
#[derive(Debug, Clone)]
pub struct StagedUpdates {
    /// Staging directory.
    updates_dir: PathBuf,
    /// Per-user extension directory.
    user_dir: PathBuf,
}

impl StagedUpdates {
    /// Creates an update source over the given directories.
    pub fn new(updates_dir: impl Into<PathBuf>, user_dir: impl Into<PathBuf>) -> Self {
        Self {
            updates_dir: updates_dir.into(),
            user_dir: user_dir.into(),
        }
    }

    /// Ids with a staged update, sorted.
    async fn staged(&self) -> AppResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.updates_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut uuids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    uuids.push(name.to_string());
                }
            }
        }
        uuids.sort();
        Ok(uuids)
    }
}

#[async_trait]
impl UpdateSource for StagedUpdates {
    async fn check_for_updates(&self) -> AppResult<Vec<String>> {
        let uuids = self.staged().await?;
        if !uuids.is_empty() {
            info!(count = uuids.len(), "Staged extension updates found");
        }
        Ok(uuids)
    }

    async fn install_pending_updates(&self) -> AppResult<Vec<String>> {
        let mut installed = Vec::new();

        for uuid in self.staged().await? {
            let staged = self.updates_dir.join(&uuid);
            let target = self.user_dir.join(&uuid);

            if let Err(e) = replace_dir(&staged, &target).await {
                warn!(uuid = %uuid, error = %e, "Failed to install extension update");
                continue;
            }

            info!(uuid = %uuid, path = %target.display(), "Extension update installed");
            installed.push(uuid);
        }

        Ok(installed)
    }
}

/// Moves `from` over `to`, removing whatever `to` held.
async fn replace_dir(from: &std::path::Path, to: &std::path::Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(to).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(from, to).await
}

/// Marker file recording that a major shell version has been seen.
#[derive(Debug, Clone)]
pub struct MarkerFile {
    /// Directory holding the marker.
    data_dir: PathBuf,
    /// Major shell version.
    major: String,
}

impl MarkerFile {
    /// Creates a marker for `major` under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, major: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            major: major.into(),
        }
    }

    /// Marker file path, `<data_dir>/update-check-<major>`.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(format!("update-check-{}", self.major))
    }
}

#[async_trait]
impl UpgradeMarker for MarkerFile {
    async fn mark(&self) -> AppResult<bool> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let path = self.path();
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => {
                info!(path = %path.display(), "First start on this major shell version");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
