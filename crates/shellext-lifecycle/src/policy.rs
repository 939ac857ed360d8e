//! Enablement policy: which extensions settings and the session mode want,
//! in which order, and whether the user may change them.

use std::cmp::Ordering;

use shellext_core::traits::{SettingsKey, SettingsStore};
use shellext_core::types::{ExtensionState, SessionMode};

/// Point-in-time copy of every setting the policy reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsSnapshot {
    /// `enabled-extensions`.
    pub enabled: Vec<String>,
    /// `disabled-extensions`.
    pub disabled: Vec<String>,
    /// `disable-user-extensions`.
    pub user_extensions_disabled: bool,
    /// `disable-extension-version-validation`.
    pub version_validation_disabled: bool,
    /// Writability of `enabled-extensions`.
    pub enabled_writable: bool,
    /// Writability of `disable-user-extensions`.
    pub user_disabled_writable: bool,
}

impl SettingsSnapshot {
    /// Reads every value from the store.
    pub async fn read(store: &dyn SettingsStore) -> Self {
        Self {
            enabled: store.enabled_extensions().await,
            disabled: store.disabled_extensions().await,
            user_extensions_disabled: store.user_extensions_disabled().await,
            version_validation_disabled: store.version_validation_disabled().await,
            enabled_writable: store.is_writable(SettingsKey::EnabledExtensions).await,
            user_disabled_writable: store.is_writable(SettingsKey::DisableUserExtensions).await,
        }
    }
}

/// Computes the desired enabled set: mode-mandated extensions, then the
/// user's list unless user extensions are globally disabled, minus the
/// disabled list. Duplicates keep their first position.
pub fn desired_extensions(mode: &SessionMode, settings: &SettingsSnapshot) -> Vec<String> {
    let user = if settings.user_extensions_disabled {
        &[][..]
    } else {
        settings.enabled.as_slice()
    };

    let mut desired: Vec<String> = Vec::new();
    for uuid in mode.enabled_extensions.iter().chain(user) {
        if settings.disabled.contains(uuid) || desired.contains(uuid) {
            continue;
        }
        desired.push(uuid.clone());
    }
    desired
}

/// Stable load-order comparison: mode-mandated extensions first, then
/// discovery order. Unknown ids sort last and keep their relative order.
pub fn compare_extensions(
    mode: &SessionMode,
    a: &str,
    b: &str,
    discovery_index: impl Fn(&str) -> Option<usize>,
) -> Ordering {
    let a_mode = mode.mandates(a);
    let b_mode = mode.mandates(b);

    b_mode.cmp(&a_mode).then_with(|| {
        let a_idx = discovery_index(a).unwrap_or(usize::MAX);
        let b_idx = discovery_index(b).unwrap_or(usize::MAX);
        a_idx.cmp(&b_idx)
    })
}

/// Sorts ids in place with [`compare_extensions`].
pub fn sort_extensions(
    mode: &SessionMode,
    uuids: &mut [String],
    discovery_index: impl Fn(&str) -> Option<usize>,
) {
    uuids.sort_by(|a, b| compare_extensions(mode, a, b, &discovery_index));
}

/// Whether the user may toggle an extension.
///
/// Mode-mandated extensions can only be turned off through the
/// user-extensions switch; user extensions need a writable list and
/// user extensions not being globally disabled. Failed extensions can't
/// be toggled at all.
pub fn can_change(
    uuid: &str,
    state: ExtensionState,
    mode: &SessionMode,
    settings: &SettingsSnapshot,
) -> bool {
    if state.is_failure() {
        return false;
    }

    if mode.mandates(uuid) {
        settings.user_disabled_writable
    } else {
        settings.enabled_writable && !settings.user_extensions_disabled
    }
}
