//! Serializable snapshot of an extension record.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::metadata::ExtensionMetadata;
use super::state::{ExtensionOrigin, ExtensionState};

/// Snapshot of an extension as seen by subscribers and tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Unique extension id.
    pub uuid: String,
    /// Parsed manifest.
    pub metadata: ExtensionMetadata,
    /// Installation origin.
    pub origin: ExtensionOrigin,
    /// Extension directory.
    pub path: PathBuf,
    /// Current lifecycle state.
    pub state: ExtensionState,
    /// Whether the user may toggle the extension.
    pub can_change: bool,
    /// Whether settings currently want the extension enabled.
    pub enabled: bool,
    /// Whether a newer version has been staged.
    pub has_update: bool,
    /// Most recent error.
    pub error: Option<String>,
    /// Every error recorded for this record, oldest first.
    pub errors: Vec<String>,
    /// Session modes the extension may run in.
    pub session_modes: Vec<String>,
}

impl ExtensionInfo {
    /// Display name from the manifest.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
