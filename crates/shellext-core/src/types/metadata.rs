//! Extension manifest (`metadata.json`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Session mode an extension runs in when its manifest declares none.
pub const DEFAULT_SESSION_MODE: &str = "user";

/// The `version` field of a manifest. Older manifests use integers,
/// newer ones free-form strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataVersion {
    /// Integer version.
    Number(u64),
    /// Free-form version string.
    Text(String),
}

impl std::fmt::Display for MetadataVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Immutable manifest of an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtensionMetadata {
    /// Unique id; must match the directory name.
    #[serde(default)]
    pub uuid: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Shell versions the extension declares itself compatible with.
    #[serde(default)]
    pub shell_version: Vec<String>,
    /// Session modes the extension may run in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_modes: Option<Vec<String>>,
    /// Extension's own version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<MetadataVersion>,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Settings schema id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_schema: Option<String>,
    /// Translation domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gettext_domain: Option<String>,
    /// Vendor fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ExtensionMetadata {
    /// Checks the required properties and that `uuid` matches the
    /// directory the manifest was found in.
    pub fn validate(&self, dir_uuid: &str) -> Result<(), String> {
        let required = [
            ("uuid", self.uuid.is_empty()),
            ("name", self.name.is_empty()),
            ("description", self.description.is_empty()),
            ("shell-version", self.shell_version.is_empty()),
        ];

        if let Some((prop, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(format!("missing \"{prop}\" property in metadata.json"));
        }

        if self.uuid != dir_uuid {
            return Err(format!(
                "uuid \"{}\" from metadata.json does not match directory name \"{}\"",
                self.uuid, dir_uuid
            ));
        }

        Ok(())
    }

    /// Session modes the extension may run in (`["user"]` when undeclared).
    pub fn session_modes(&self) -> Vec<String> {
        self.session_modes
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_SESSION_MODE.to_string()])
    }

    /// Whether any declared shell version shares the given major version.
    pub fn supports_shell_major(&self, major: &str) -> bool {
        self.shell_version
            .iter()
            .any(|v| v.split('.').next() == Some(major))
    }
}

/// Extracts the major component of a dotted version string.
pub fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}
