//! Extension lifecycle states and origins.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single extension record.
///
/// `Inactive` covers both "imported but disabled" and the parked state
/// where the record was validated but its code was never imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionState {
    /// Record created, not yet validated against policy.
    Uninitialized,
    /// Validated and not running.
    Inactive,
    /// `enable()` is in flight.
    Activating,
    /// `enable()` completed; the id is in the enable order.
    Active,
    /// `disable()` is in flight.
    Deactivating,
    /// A load or transition failed; see the record's error.
    Error,
    /// Incompatible with the running shell version. Terminal until reload.
    OutOfDate,
    /// Unloaded. Terminal.
    Uninstalled,
}

impl ExtensionState {
    /// Returns the string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
            Self::Error => "error",
            Self::OutOfDate => "out_of_date",
            Self::Uninstalled => "uninstalled",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ExtensionState) -> bool {
        use ExtensionState::*;

        match (*self, next) {
            (Uninstalled, _) => false,
            (_, Uninstalled) => true,
            (_, Error) => true,
            (Uninitialized, Inactive | OutOfDate) => true,
            (Inactive, Inactive | Activating | OutOfDate) => true,
            (Activating, Active) => true,
            (Active, Deactivating | OutOfDate) => true,
            (Deactivating, Inactive) => true,
            (Error, OutOfDate) => true,
            _ => false,
        }
    }

    /// Whether a call into the extension's code is in flight.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Activating | Self::Deactivating)
    }

    /// Whether the state reports a problem to the user.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::OutOfDate)
    }
}

impl std::fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an extension was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionOrigin {
    /// Installed system-wide; cannot be uninstalled by the user.
    System,
    /// Installed in the user's data directory.
    PerUser,
}

impl std::fmt::Display for ExtensionOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::PerUser => write!(f, "per_user"),
        }
    }
}
