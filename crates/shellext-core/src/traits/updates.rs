//! Staged updates and the one-shot major-version marker.

use async_trait::async_trait;

use crate::result::AppResult;

/// Source of extension updates.
#[async_trait]
pub trait UpdateSource: Send + Sync + std::fmt::Debug + 'static {
    /// Refreshes the set of staged updates. Returns the ids with an update pending.
    async fn check_for_updates(&self) -> AppResult<Vec<String>>;

    /// Installs every staged update. Returns the ids that were replaced.
    async fn install_pending_updates(&self) -> AppResult<Vec<String>>;
}

/// Records that the current major shell version has been seen.
#[async_trait]
pub trait UpgradeMarker: Send + Sync + std::fmt::Debug + 'static {
    /// Creates the marker. Returns `true` only if it did not exist before,
    /// i.e. this is the first run after a major version change.
    async fn mark(&self) -> AppResult<bool>;
}
