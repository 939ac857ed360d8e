//! Shell runtime configuration.

use serde::{Deserialize, Serialize};

use crate::types::metadata::major_version;

/// Describes the shell the extensions run inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Full shell version, e.g. `"46.2"`.
    #[serde(default = "default_version")]
    pub version: String,
}

impl ShellConfig {
    /// Major component of the shell version.
    pub fn major(&self) -> &str {
        major_version(&self.version)
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
        }
    }
}

fn default_version() -> String {
    "46.0".to_string()
}
