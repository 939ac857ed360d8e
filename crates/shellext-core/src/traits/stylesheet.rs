//! Best-effort stylesheet loading.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ExtensionError;
use crate::types::ExtensionInfo;

/// Loads and unloads an extension's stylesheet into the shell theme.
#[async_trait]
pub trait StylesheetLoader: Send + Sync + std::fmt::Debug + 'static {
    /// Loads the stylesheet for `extension` in the given session mode.
    ///
    /// Returns `Ok(None)` if the extension ships no stylesheet.
    async fn load_stylesheet(
        &self,
        extension: &ExtensionInfo,
        session_mode: &str,
    ) -> Result<Option<PathBuf>, ExtensionError>;

    /// Unloads whatever stylesheet is loaded for `uuid`. No-op if none.
    async fn unload_stylesheet(&self, uuid: &str);
}
