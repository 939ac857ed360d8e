//! Settings store implementations.
//!
//! - [`MemorySettings`]: in-process values, used by tests and embedders.
//! - [`FileSettings`]: a JSON file polled by the host.

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};

use shellext_core::traits::SettingsKey;

pub use file::FileSettings;
pub use memory::MemorySettings;

/// Persisted values of every extension setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SettingsValues {
    /// `enabled-extensions`.
    pub enabled_extensions: Vec<String>,
    /// `disabled-extensions`.
    pub disabled_extensions: Vec<String>,
    /// `disable-user-extensions`.
    pub disable_user_extensions: bool,
    /// `disable-extension-version-validation`.
    pub disable_extension_version_validation: bool,
}

impl SettingsValues {
    /// Keys whose value differs between `self` and `other`.
    pub fn changed_keys(&self, other: &SettingsValues) -> Vec<SettingsKey> {
        SettingsKey::ALL
            .into_iter()
            .filter(|key| match key {
                SettingsKey::EnabledExtensions => {
                    self.enabled_extensions != other.enabled_extensions
                }
                SettingsKey::DisabledExtensions => {
                    self.disabled_extensions != other.disabled_extensions
                }
                SettingsKey::DisableUserExtensions => {
                    self.disable_user_extensions != other.disable_user_extensions
                }
                SettingsKey::DisableVersionValidation => {
                    self.disable_extension_version_validation
                        != other.disable_extension_version_validation
                }
            })
            .collect()
    }
}
