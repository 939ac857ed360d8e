//! Manifest loading.

use std::path::Path;

use async_trait::async_trait;

use crate::error::ExtensionError;
use crate::types::ExtensionMetadata;

/// Reads an extension's manifest into an immutable metadata record.
#[async_trait]
pub trait MetadataLoader: Send + Sync + std::fmt::Debug + 'static {
    /// Loads and validates the manifest in `dir`.
    ///
    /// Fails with [`ExtensionError::Metadata`] if the manifest is absent
    /// or malformed.
    async fn load_metadata(&self, uuid: &str, dir: &Path)
    -> Result<ExtensionMetadata, ExtensionError>;
}
