//! The manager's per-extension bookkeeping.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, trace};

use shellext_core::traits::ExtensionModule;
use shellext_core::types::{ExtensionInfo, ExtensionMetadata, ExtensionOrigin, ExtensionState};

/// Shared handle to a constructed extension object.
///
/// The lock is held for the duration of every `enable` or `disable`
/// call, so waiting on it waits for the call in flight.
pub type ModuleHandle = Arc<Mutex<Box<dyn ExtensionModule>>>;

/// One known extension. Owned exclusively by the registry.
#[derive(Debug)]
pub struct ExtensionRecord {
    /// Unique extension id.
    pub uuid: String,
    /// Parsed manifest.
    pub metadata: ExtensionMetadata,
    /// Installation origin.
    pub origin: ExtensionOrigin,
    /// Extension directory.
    pub dir: PathBuf,
    state: ExtensionState,
    /// Whether the user may toggle the extension.
    pub can_change: bool,
    /// Last known desired-enabled flag.
    pub enabled: bool,
    /// Whether an update has been staged.
    pub has_update: bool,
    /// Most recent error.
    pub error: Option<String>,
    /// Error history.
    pub errors: Vec<String>,
    /// Constructed extension object; set once initialization succeeds.
    pub module: Option<ModuleHandle>,
    /// Set once the module's code has been imported. Never reset.
    pub imported: bool,
    /// Stylesheet currently loaded for this extension.
    pub stylesheet: Option<PathBuf>,
}

impl ExtensionRecord {
    /// Creates a record in the `Uninitialized` state.
    pub fn new(
        metadata: ExtensionMetadata,
        origin: ExtensionOrigin,
        dir: PathBuf,
        enabled: bool,
    ) -> Self {
        Self {
            uuid: metadata.uuid.clone(),
            metadata,
            origin,
            dir,
            state: ExtensionState::Uninitialized,
            can_change: false,
            enabled,
            has_update: false,
            error: None,
            errors: Vec::new(),
            module: None,
            imported: false,
            stylesheet: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExtensionState {
        self.state
    }

    /// Moves to `next`. Illegal edges are programming errors.
    pub(crate) fn transition(&mut self, next: ExtensionState) {
        if !self.state.can_transition_to(next) {
            error!(
                uuid = %self.uuid,
                from = %self.state,
                to = %next,
                "Illegal extension state transition"
            );
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
        }

        trace!(uuid = %self.uuid, from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    /// Records a failure and moves to `Error`.
    pub(crate) fn fail(&mut self, message: String) {
        self.errors.push(message.clone());
        self.error = Some(message);
        self.transition(ExtensionState::Error);
    }

    /// Installs the constructed extension object.
    pub(crate) fn set_module(&mut self, module: Box<dyn ExtensionModule>) {
        self.module = Some(Arc::new(Mutex::new(module)));
        self.imported = true;
    }

    /// Session modes the extension may run in.
    pub fn session_modes(&self) -> Vec<String> {
        self.metadata.session_modes()
    }

    /// Serializable snapshot.
    pub fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            uuid: self.uuid.clone(),
            metadata: self.metadata.clone(),
            origin: self.origin,
            path: self.dir.clone(),
            state: self.state,
            can_change: self.can_change,
            enabled: self.enabled,
            has_update: self.has_update,
            error: self.error.clone(),
            errors: self.errors.clone(),
            session_modes: self.session_modes(),
        }
    }
}
