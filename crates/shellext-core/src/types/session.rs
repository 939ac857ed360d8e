//! Session modes gate which extensions may run.

use serde::{Deserialize, Serialize};

use super::metadata::DEFAULT_SESSION_MODE;

/// The operating context of the shell (user session, lock screen, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMode {
    /// Mode name, e.g. `"user"` or `"unlock-dialog"`.
    pub name: String,
    /// Mode this one inherits from.
    #[serde(default)]
    pub parent: Option<String>,
    /// Whether extensions may run at all in this mode.
    #[serde(default = "default_true")]
    pub allow_extensions: bool,
    /// Extensions the mode itself mandates, enabled regardless of user settings.
    #[serde(default)]
    pub enabled_extensions: Vec<String>,
}

impl SessionMode {
    /// Creates a mode with no parent that allows extensions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            allow_extensions: true,
            enabled_extensions: Vec::new(),
        }
    }

    /// The regular user session.
    pub fn user() -> Self {
        Self::new(DEFAULT_SESSION_MODE)
    }

    /// Sets the parent mode.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the mode-mandated extensions.
    pub fn with_enabled_extensions(mut self, uuids: Vec<String>) -> Self {
        self.enabled_extensions = uuids;
        self
    }

    /// Sets whether extensions are allowed.
    pub fn with_allow_extensions(mut self, allow: bool) -> Self {
        self.allow_extensions = allow;
        self
    }

    /// The mode followed by its parent, if any.
    pub fn mode_chain(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(self.parent.as_deref())
            .collect()
    }

    /// Whether an extension declaring `session_modes` may run in this mode.
    pub fn supports(&self, session_modes: &[String]) -> bool {
        self.mode_chain()
            .iter()
            .any(|mode| session_modes.iter().any(|m| m == mode))
    }

    /// Whether the mode mandates the given extension.
    pub fn mandates(&self, uuid: &str) -> bool {
        self.enabled_extensions.iter().any(|u| u == uuid)
    }
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::user()
    }
}

fn default_true() -> bool {
    true
}
