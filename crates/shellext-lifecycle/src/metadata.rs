//! `metadata.json` loader.

use std::path::Path;

use async_trait::async_trait;

use shellext_core::error::ExtensionError;
use shellext_core::traits::MetadataLoader;
use shellext_core::types::ExtensionMetadata;

/// Manifest file name inside an extension directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Reads and validates `metadata.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMetadataLoader;

impl JsonMetadataLoader {
    /// Creates a loader.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataLoader for JsonMetadataLoader {
    async fn load_metadata(
        &self,
        uuid: &str,
        dir: &Path,
    ) -> Result<ExtensionMetadata, ExtensionError> {
        let fail = |reason: String| ExtensionError::Metadata {
            uuid: uuid.to_string(),
            reason,
        };

        let contents = match tokio::fs::read_to_string(dir.join(METADATA_FILE)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(fail(format!("Missing {METADATA_FILE}")));
            }
            Err(e) => return Err(fail(format!("Failed to load {METADATA_FILE}: {e}"))),
        };

        let metadata: ExtensionMetadata = serde_json::from_str(&contents)
            .map_err(|e| fail(format!("Failed to parse {METADATA_FILE}: {e}")))?;

        metadata.validate(uuid).map_err(fail)?;

        Ok(metadata)
    }
}
