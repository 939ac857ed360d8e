//! Extension discovery and persistence configuration.

use serde::{Deserialize, Serialize};

/// Where extensions, settings, and upgrade state live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    /// Per-user extensions directory. Scanned first.
    #[serde(default = "default_user_dir")]
    pub user_dir: String,
    /// System-wide extension directories, in priority order.
    #[serde(default = "default_system_dirs")]
    pub system_dirs: Vec<String>,
    /// Directory for host state such as the major-version marker.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory where downloaded updates are staged.
    #[serde(default = "default_updates_dir")]
    pub updates_dir: String,
    /// JSON settings file holding the enabled/disabled lists.
    #[serde(default = "default_settings_file")]
    pub settings_file: String,
    /// Whether the settings file is read-only for this host.
    #[serde(default)]
    pub settings_read_only: bool,
    /// How often the host re-reads the settings file, in seconds.
    #[serde(default = "default_settings_poll")]
    pub settings_poll_seconds: u64,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            user_dir: default_user_dir(),
            system_dirs: default_system_dirs(),
            data_dir: default_data_dir(),
            updates_dir: default_updates_dir(),
            settings_file: default_settings_file(),
            settings_read_only: false,
            settings_poll_seconds: default_settings_poll(),
        }
    }
}

fn default_user_dir() -> String {
    "data/extensions".to_string()
}

fn default_system_dirs() -> Vec<String> {
    vec!["/usr/share/gnome-shell/extensions".to_string()]
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_updates_dir() -> String {
    "data/extension-updates".to_string()
}

fn default_settings_file() -> String {
    "data/settings.json".to_string()
}

fn default_settings_poll() -> u64 {
    2
}
