//! Extension manager. Owns every extension record and drives the
//! lifecycle state machine.
//!
//! Public operations run one at a time through an operation queue, so
//! operations triggered by settings changes, session-mode changes, and
//! callers are applied in arrival order. The queue is given up while an
//! extension's own `enable` or `disable` runs: a slow extension only holds
//! up operations on itself. Records live behind a plain mutex that is
//! never held across an await, so reads are always served immediately.
//!
//! The enable order is kept LIFO: disabling an extension first disables
//! every extension enabled after it (newest first), disables the target,
//! then re-enables the others in their original order.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shellext_core::config::shell::ShellConfig;
use shellext_core::error::{AppError, ErrorKind, ExtensionError};
use shellext_core::events::ExtensionEvent;
use shellext_core::result::AppResult;
use shellext_core::traits::{
    MetadataLoader, ModuleLoader, SettingsChange, SettingsKey, SettingsStore, StylesheetLoader,
    UpdateSource, UpgradeMarker,
};
use shellext_core::types::metadata::major_version;
use shellext_core::types::{ExtensionInfo, ExtensionOrigin, ExtensionState, SessionMode};

use crate::events::EventBus;
use crate::finder::ExtensionFinder;
use crate::metadata::JsonMetadataLoader;
use crate::policy::{self, SettingsSnapshot};
use crate::record::{ExtensionRecord, ModuleHandle};
use crate::registry::ExtensionRegistry;
use crate::stylesheet::ThemeStylesheets;

/// State guarded by the manager's record lock.
#[derive(Debug)]
struct ManagerState {
    /// Every known extension.
    registry: ExtensionRegistry,
    /// Current session mode.
    session: SessionMode,
    /// Settings as of the last reconcile.
    settings: SettingsSnapshot,
    /// Desired enabled set as of the last reconcile.
    desired: Vec<String>,
    /// Whether shell-version compatibility is enforced.
    check_version: bool,
    /// Set once the initial load completed.
    initialized: bool,
}

/// A caller's place in the operation queue.
struct Turn<'a> {
    queue: &'a tokio::sync::Mutex<()>,
    guard: Option<tokio::sync::MutexGuard<'a, ()>>,
}

impl<'a> Turn<'a> {
    async fn take(queue: &'a tokio::sync::Mutex<()>) -> Self {
        let guard = queue.lock().await;
        Self {
            queue,
            guard: Some(guard),
        }
    }

    /// Lets queued operations run until [`Turn::resume`].
    fn release(&mut self) {
        self.guard = None;
    }

    async fn resume(&mut self) {
        if self.guard.is_none() {
            self.guard = Some(self.queue.lock().await);
        }
    }
}

/// Which extension entry point to call.
#[derive(Debug, Clone, Copy)]
enum ModuleCall {
    Enable,
    Disable,
}

/// Outcome of validating a freshly created record.
enum Validation {
    Unknown,
    /// Already past validation; carries whether it is healthy.
    Settled(bool),
    /// Validation moved the record to a failure state.
    Rejected,
    /// Now `Inactive`; carries whether it should be activated right away.
    Ready { wanted: bool },
}

/// Builder for [`ExtensionManager`].
#[derive(Debug, Default)]
pub struct ExtensionManagerBuilder {
    shell_version: Option<String>,
    session_mode: Option<SessionMode>,
    metadata_loader: Option<Arc<dyn MetadataLoader>>,
    module_loader: Option<Arc<dyn ModuleLoader>>,
    settings: Option<Arc<dyn SettingsStore>>,
    stylesheets: Option<Arc<dyn StylesheetLoader>>,
    updates: Option<Arc<dyn UpdateSource>>,
    marker: Option<Arc<dyn UpgradeMarker>>,
    finder: Option<ExtensionFinder>,
    events: Option<Arc<EventBus>>,
}

impl ExtensionManagerBuilder {
    /// Full shell version, e.g. `"46.2"`. Defaults to the configured default.
    pub fn shell_version(mut self, version: impl Into<String>) -> Self {
        self.shell_version = Some(version.into());
        self
    }

    /// Initial session mode. Defaults to the user session.
    pub fn session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = Some(mode);
        self
    }

    /// Manifest loader. Defaults to [`JsonMetadataLoader`].
    pub fn metadata_loader(mut self, loader: Arc<dyn MetadataLoader>) -> Self {
        self.metadata_loader = Some(loader);
        self
    }

    /// Module loader. Required.
    pub fn module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.module_loader = Some(loader);
        self
    }

    /// Settings store. Required.
    pub fn settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Stylesheet loader. Defaults to [`ThemeStylesheets`].
    pub fn stylesheets(mut self, stylesheets: Arc<dyn StylesheetLoader>) -> Self {
        self.stylesheets = Some(stylesheets);
        self
    }

    /// Source of staged updates used on a major version upgrade.
    pub fn updates(mut self, updates: Arc<dyn UpdateSource>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Marker gating the major version upgrade. Without one the upgrade
    /// never runs.
    pub fn upgrade_marker(mut self, marker: Arc<dyn UpgradeMarker>) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Directory scanner used by [`ExtensionManager::load_extensions`].
    pub fn finder(mut self, finder: ExtensionFinder) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Event bus to publish on. Defaults to a fresh bus.
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the manager, taking an initial settings snapshot.
    pub async fn build(self) -> AppResult<ExtensionManager> {
        let module_loader = self
            .module_loader
            .ok_or_else(|| AppError::configuration("Extension manager needs a module loader"))?;
        let settings = self
            .settings
            .ok_or_else(|| AppError::configuration("Extension manager needs a settings store"))?;

        let shell_version = self
            .shell_version
            .unwrap_or_else(|| ShellConfig::default().version);
        let session = self.session_mode.unwrap_or_default();

        let snapshot = SettingsSnapshot::read(settings.as_ref()).await;
        let desired = policy::desired_extensions(&session, &snapshot);

        info!(
            shell_version = %shell_version,
            session_mode = %session.name,
            check_version = !snapshot.version_validation_disabled,
            "Extension manager created"
        );

        Ok(ExtensionManager {
            shell_major: major_version(&shell_version).to_string(),
            metadata_loader: self
                .metadata_loader
                .unwrap_or_else(|| Arc::new(JsonMetadataLoader::new())),
            module_loader,
            settings,
            stylesheets: self
                .stylesheets
                .unwrap_or_else(|| Arc::new(ThemeStylesheets::new())),
            updates: self.updates,
            marker: self.marker,
            finder: self.finder,
            events: self.events.unwrap_or_default(),
            state: Mutex::new(ManagerState {
                registry: ExtensionRegistry::new(),
                session,
                check_version: !snapshot.version_validation_disabled,
                settings: snapshot,
                desired,
                initialized: false,
            }),
            queue: tokio::sync::Mutex::new(()),
        })
    }
}


/// Drives load, enable, disable, and reload of every extension.
#[derive(Debug)]
pub struct ExtensionManager {
    /// Major component of the running shell version.
    shell_major: String,
    metadata_loader: Arc<dyn MetadataLoader>,
    module_loader: Arc<dyn ModuleLoader>,
    settings: Arc<dyn SettingsStore>,
    stylesheets: Arc<dyn StylesheetLoader>,
    updates: Option<Arc<dyn UpdateSource>>,
    marker: Option<Arc<dyn UpgradeMarker>>,
    finder: Option<ExtensionFinder>,
    /// Lifecycle event publisher.
    events: Arc<EventBus>,
    /// Records and policy inputs. Never held across an await.
    state: Mutex<ManagerState>,
    /// Operation queue. Every public operation holds a turn while it
    /// touches records.
    queue: tokio::sync::Mutex<()>,
}

impl ExtensionManager {
    /// Starts building a manager.
    pub fn builder() -> ExtensionManagerBuilder {
        ExtensionManagerBuilder::default()
    }

    /// Event bus lifecycle events are published on.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Major shell version extensions are checked against.
    pub fn shell_major(&self) -> &str {
        &self.shell_major
    }

    // -- accessors -----------------------------------------------------

    /// Snapshot of one extension.
    pub async fn lookup(&self, uuid: &str) -> Option<ExtensionInfo> {
        self.state().registry.get(uuid).map(|r| r.info())
    }

    /// Registered ids in discovery order.
    pub async fn uuids(&self) -> Vec<String> {
        self.state().registry.uuids()
    }

    /// Snapshots of every extension in discovery order.
    pub async fn list(&self) -> Vec<ExtensionInfo> {
        let st = self.state();
        st.registry.records().map(|r| r.info()).collect()
    }

    /// Active ids in activation order.
    pub async fn enable_order(&self) -> Vec<String> {
        self.state().registry.enable_order().to_vec()
    }

    /// Current session mode.
    pub async fn session_mode(&self) -> SessionMode {
        self.state().session.clone()
    }

    /// Whether the initial load has completed.
    pub async fn is_initialized(&self) -> bool {
        self.state().initialized
    }

    // -- record lifecycle ----------------------------------------------

    /// Reads an extension's manifest and registers a new record in
    /// `Uninitialized`.
    pub async fn create_record(
        &self,
        uuid: &str,
        dir: &Path,
        origin: ExtensionOrigin,
    ) -> Result<ExtensionInfo, ExtensionError> {
        let _turn = Turn::take(&self.queue).await;
        self.create_record_inner(uuid, dir, origin).await
    }

    /// Validates a registered record and, if settings want it and the
    /// session allows it, initializes and activates it.
    ///
    /// Returns `false` if the extension ended out of date or failed.
    pub async fn load_record(&self, uuid: &str) -> bool {
        let mut turn = Turn::take(&self.queue).await;
        self.load_record_inner(&mut turn, uuid).await
    }

    /// Activates an extension. A no-op if it is already active or unknown.
    ///
    /// Returns whether the extension is active afterwards.
    pub async fn activate(&self, uuid: &str) -> bool {
        let mut turn = Turn::take(&self.queue).await;
        self.activate_inner(&mut turn, uuid).await
    }

    /// Deactivates an extension, rebasing everything enabled after it.
    ///
    /// Returns `false` if it was not active or is unknown.
    pub async fn deactivate(&self, uuid: &str) -> bool {
        let mut turn = Turn::take(&self.queue).await;
        self.deactivate_inner(&mut turn, uuid).await
    }

    /// Unloads an extension and loads it again from disk.
    pub async fn reload(&self, uuid: &str) -> Result<bool, ExtensionError> {
        let mut turn = Turn::take(&self.queue).await;
        self.reload_inner(&mut turn, uuid).await
    }

    /// Deactivates and forgets an extension. Its directory is untouched.
    pub async fn unload(&self, uuid: &str) -> Result<(), ExtensionError> {
        let mut turn = Turn::take(&self.queue).await;
        self.unload_inner(&mut turn, uuid).await
    }

    /// Scans the extension directories and loads everything found.
    ///
    /// Ids already registered are skipped. Returns the number of records
    /// created.
    pub async fn load_extensions(&self) -> AppResult<usize> {
        let finder = self
            .finder
            .as_ref()
            .ok_or_else(|| AppError::configuration("No extension finder configured"))?;
        let discovered = finder.scan().await?;

        let mut turn = Turn::take(&self.queue).await;
        self.refresh_settings().await;

        let mut created = Vec::new();
        for found in discovered {
            let known = self.state().registry.contains(&found.uuid);
            if known {
                continue;
            }
            match self
                .create_record_inner(&found.uuid, &found.dir, found.origin)
                .await
            {
                Ok(_) => created.push(found.uuid),
                Err(e) => {
                    warn!(uuid = %found.uuid, error = %e, "Could not load extension");
                }
            }
        }

        let initialized = {
            let guard = self.state();
            let st = &*guard;
            policy::sort_extensions(&st.session, &mut created, |u| st.registry.discovery_index(u));
            st.initialized
        };

        if !initialized {
            if let Err(e) = self.handle_major_version_upgrade_inner(&mut turn).await {
                error!(error = %e, "Major version upgrade handling failed");
            }
        }

        for uuid in &created {
            self.load_record_inner(&mut turn, uuid).await;
        }

        let active = {
            let mut st = self.state();
            st.initialized = true;
            st.registry.enable_order().len()
        };
        info!(count = created.len(), active, "Extensions loaded");
        Ok(created.len())
    }

    // -- settings-driven operations ------------------------------------

    /// Brings active extensions in line with settings and the session mode.
    ///
    /// Deactivates active extensions that are no longer desired or
    /// supported, then activates ids that just became desired. Extensions
    /// that stayed desired are left in whatever state they are in.
    pub async fn reconcile_desired_set(&self) {
        let mut turn = Turn::take(&self.queue).await;
        self.reconcile_inner(&mut turn).await;
    }

    /// Runs the once-per-major-version update pass.
    ///
    /// Returns whether the pass ran.
    pub async fn handle_major_version_upgrade(&self) -> AppResult<bool> {
        let mut turn = Turn::take(&self.queue).await;
        self.handle_major_version_upgrade_inner(&mut turn).await
    }

    /// Adds an extension to the enabled list and removes it from the
    /// disabled list. Returns `false` for unknown ids.
    ///
    /// The resulting settings change drives the actual activation.
    pub async fn enable_extension(&self, uuid: &str) -> AppResult<bool> {
        let known = self.state().registry.contains(uuid);
        if !known {
            return Ok(false);
        }

        let mut disabled = self.settings.disabled_extensions().await;
        if disabled.iter().any(|u| u == uuid) {
            disabled.retain(|u| u != uuid);
            self.settings.set_disabled_extensions(disabled).await?;
        }

        let mut enabled = self.settings.enabled_extensions().await;
        if !enabled.iter().any(|u| u == uuid) {
            enabled.push(uuid.to_string());
            self.settings.set_enabled_extensions(enabled).await?;
        }

        Ok(true)
    }

    /// Removes an extension from the enabled list and adds it to the
    /// disabled list. Returns `false` for unknown ids.
    pub async fn disable_extension(&self, uuid: &str) -> AppResult<bool> {
        let known = self.state().registry.contains(uuid);
        if !known {
            return Ok(false);
        }

        let mut enabled = self.settings.enabled_extensions().await;
        if enabled.iter().any(|u| u == uuid) {
            enabled.retain(|u| u != uuid);
            self.settings.set_enabled_extensions(enabled).await?;
        }

        let mut disabled = self.settings.disabled_extensions().await;
        if !disabled.iter().any(|u| u == uuid) {
            disabled.push(uuid.to_string());
            self.settings.set_disabled_extensions(disabled).await?;
        }

        Ok(true)
    }

    /// Unloads a per-user extension and deletes its directory.
    ///
    /// Returns `false` for system or unknown extensions.
    pub async fn uninstall_extension(&self, uuid: &str) -> AppResult<bool> {
        let mut turn = Turn::take(&self.queue).await;

        let target = {
            let st = self.state();
            st.registry.get(uuid).map(|r| (r.origin, r.dir.clone()))
        };
        let dir = match target {
            Some((ExtensionOrigin::PerUser, dir)) => dir,
            Some(_) => {
                warn!(uuid = %uuid, "Refusing to uninstall a system extension");
                return Ok(false);
            }
            None => return Ok(false),
        };

        self.unload_inner(&mut turn, uuid).await?;

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Io,
                    format!("Failed to remove {}", dir.display()),
                    e,
                ));
            }
        }

        info!(uuid = %uuid, path = %dir.display(), "Extension uninstalled");
        Ok(true)
    }

    /// Flags an extension as having a staged update.
    pub async fn notify_extension_update(&self, uuid: &str) -> bool {
        let found = {
            let mut st = self.state();
            match st.registry.get_mut(uuid) {
                Some(record) => {
                    record.has_update = true;
                    true
                }
                None => false,
            }
        };
        if !found {
            return false;
        }
        info!(uuid = %uuid, "Extension update available");
        self.emit_state(uuid).await;
        true
    }

    /// Switches to a new session mode.
    ///
    /// If the mode allows extensions the desired set is reconciled, which
    /// also deactivates extensions the mode doesn't support, and then every
    /// desired extension the mode supports is activated. Otherwise every
    /// extension is disabled.
    pub async fn update_session_mode(&self, mode: SessionMode) {
        let mut turn = Turn::take(&self.queue).await;
        let allow_extensions = {
            let mut st = self.state();
            info!(
                from = %st.session.name,
                to = %mode.name,
                allow_extensions = mode.allow_extensions,
                "Session mode changed"
            );
            st.session = mode;
            st.session.allow_extensions
        };

        if allow_extensions {
            self.reconcile_inner(&mut turn).await;
            let wanted = {
                let st = self.state();
                Self::desired_where(&st, |_, record| {
                    record.state() == ExtensionState::Inactive
                })
            };
            for uuid in &wanted {
                self.activate_inner(&mut turn, uuid).await;
            }
        } else {
            self.disable_all_inner(&mut turn).await;
            self.refresh_flags(true).await;
        }
    }

    /// Re-reads the version validation flag; when it flipped, disables
    /// everything and reloads every extension.
    ///
    /// Previously active extensions reload first, in their old enable
    /// order, then the rest in discovery order.
    pub async fn on_version_validation_changed(&self) {
        let mut turn = Turn::take(&self.queue).await;

        let check_version = !self.settings.version_validation_disabled().await;
        let flipped = {
            let mut st = self.state();
            let flipped = check_version != st.check_version;
            st.check_version = check_version;
            flipped
        };
        if !flipped {
            return;
        }
        info!(check_version, "Extension version validation changed");

        self.refresh_settings().await;
        let previous = {
            let st = self.state();
            if !st.initialized || !st.session.allow_extensions {
                return;
            }
            st.registry.enable_order().to_vec()
        };

        self.disable_all_inner(&mut turn).await;

        let mut order = previous.clone();
        let rest = self.state().registry.uuids();
        order.extend(rest.into_iter().filter(|u| !previous.contains(u)));

        for uuid in order {
            if let Err(e) = self.reload_inner(&mut turn, &uuid).await {
                warn!(uuid = %uuid, error = %e, "Failed to reload extension");
            }
        }
    }

    /// Recomputes `can_change` for every extension and notifies for each.
    pub async fn on_settings_writability_changed(&self) {
        let _turn = Turn::take(&self.queue).await;
        self.refresh_settings().await;
        self.refresh_flags(true).await;
    }

    /// Disables every active extension, newest first.
    pub async fn disable_all(&self) {
        let mut turn = Turn::take(&self.queue).await;
        self.disable_all_inner(&mut turn).await;
    }

    /// Dispatches one settings change notification.
    pub async fn handle_settings_change(&self, change: SettingsChange) {
        debug!(change = ?change, "Handling settings change");
        match change {
            SettingsChange::Changed(SettingsKey::DisableVersionValidation) => {
                self.on_version_validation_changed().await;
            }
            SettingsChange::Changed(_) => self.reconcile_desired_set().await,
            SettingsChange::WritableChanged(_) => self.on_settings_writability_changed().await,
        }
    }

    /// Spawns a task applying settings changes until the store goes away.
    pub fn spawn_settings_watcher(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.settings.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => self.handle_settings_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Settings watcher lagged, resynchronising");
                        self.on_version_validation_changed().await;
                        self.reconcile_desired_set().await;
                        self.on_settings_writability_changed().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Settings store closed, watcher exiting");
                        break;
                    }
                }
            }
        })
    }

    // -- internals -----------------------------------------------------

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn emit_state(&self, uuid: &str) {
        let extension = self.state().registry.get(uuid).map(|r| r.info());
        let Some(extension) = extension else {
            return;
        };
        self.events
            .publish(ExtensionEvent::StateChanged { extension })
            .await;
    }

    async fn emit_loaded(&self, uuid: &str) {
        self.events
            .publish(ExtensionEvent::Loaded {
                uuid: uuid.to_string(),
            })
            .await;
    }

    /// Re-reads settings and recomputes the desired set. Returns the
    /// desired set it replaced.
    async fn refresh_settings(&self) -> Vec<String> {
        let snapshot = SettingsSnapshot::read(self.settings.as_ref()).await;
        let mut guard = self.state();
        let st = &mut *guard;
        let desired = policy::desired_extensions(&st.session, &snapshot);
        st.settings = snapshot;
        std::mem::replace(&mut st.desired, desired)
    }

    /// Recomputes `enabled` and `can_change` on every record. Emits for
    /// every record whose flags changed, or for all when `emit_all`.
    async fn refresh_flags(&self, emit_all: bool) {
        let changed = {
            let mut guard = self.state();
            let st = &mut *guard;
            let mut changed = Vec::new();
            for uuid in st.registry.uuids() {
                let Some(record) = st.registry.get_mut(&uuid) else {
                    continue;
                };
                let enabled = st.desired.contains(&uuid);
                let can_change = policy::can_change(&uuid, record.state(), &st.session, &st.settings);
                let flipped = record.enabled != enabled || record.can_change != can_change;
                record.enabled = enabled;
                record.can_change = can_change;
                if emit_all || flipped {
                    changed.push(uuid);
                }
            }
            changed
        };

        for uuid in changed {
            self.emit_state(&uuid).await;
        }
    }

    fn refresh_can_change(st: &mut ManagerState, uuid: &str) {
        if let Some(record) = st.registry.get_mut(uuid) {
            record.can_change = policy::can_change(uuid, record.state(), &st.session, &st.settings);
        }
    }

    /// Moves a record to `Error` with `message`.
    fn fail_record(&self, uuid: &str, message: String) {
        let mut guard = self.state();
        let st = &mut *guard;
        if let Some(record) = st.registry.get_mut(uuid) {
            record.fail(message);
        }
        Self::refresh_can_change(st, uuid);
    }

    /// Desired ids the session supports and `keep` accepts, in activation
    /// order.
    fn desired_where(
        st: &ManagerState,
        keep: impl Fn(&str, &ExtensionRecord) -> bool,
    ) -> Vec<String> {
        let mut ids: Vec<String> = st
            .desired
            .iter()
            .filter(|uuid| {
                st.registry.get(uuid).is_some_and(|r| {
                    st.session.supports(&r.session_modes()) && keep(uuid.as_str(), r)
                })
            })
            .cloned()
            .collect();
        policy::sort_extensions(&st.session, &mut ids, |u| st.registry.discovery_index(u));
        ids
    }

    /// Calls into extension code with the queue released.
    async fn call_module(
        &self,
        turn: &mut Turn<'_>,
        module: Option<ModuleHandle>,
        call: ModuleCall,
    ) -> Result<(), String> {
        let Some(module) = module else {
            return Err("extension has no module".to_string());
        };

        turn.release();
        let result = {
            let mut module = module.lock().await;
            match call {
                ModuleCall::Enable => module.enable().await,
                ModuleCall::Disable => module.disable().await,
            }
        };
        turn.resume().await;
        result
    }

    /// Waits until no `enable` or `disable` call is in flight for `uuid`.
    async fn settle(&self, turn: &mut Turn<'_>, uuid: &str) {
        loop {
            let busy = {
                let st = self.state();
                st.registry
                    .get(uuid)
                    .filter(|r| r.state().is_transitional())
                    .and_then(|r| r.module.clone())
            };
            let Some(module) = busy else {
                return;
            };

            debug!(uuid = %uuid, "Waiting for extension call in flight");
            turn.release();
            drop(module.lock().await);
            turn.resume().await;
        }
    }

    async fn create_record_inner(
        &self,
        uuid: &str,
        dir: &Path,
        origin: ExtensionOrigin,
    ) -> Result<ExtensionInfo, ExtensionError> {
        let existing = self.state().registry.get(uuid).map(|r| r.dir.clone());
        if let Some(existing) = existing {
            warn!(
                uuid = %uuid,
                path = %dir.display(),
                existing = %existing.display(),
                "Extension is already registered"
            );
            return Err(ExtensionError::DuplicateId {
                uuid: uuid.to_string(),
                existing,
            });
        }

        let metadata = self
            .metadata_loader
            .load_metadata(uuid, dir)
            .await
            .inspect_err(|e| warn!(uuid = %uuid, error = %e, "Invalid extension metadata"))?;

        let info = {
            let mut st = self.state();
            let enabled = st.desired.iter().any(|u| u == uuid);
            let record = ExtensionRecord::new(metadata, origin, dir.to_path_buf(), enabled);
            let info = record.info();
            st.registry.insert(record)?;
            info
        };

        debug!(uuid = %uuid, origin = %origin, "Extension record created");
        self.emit_loaded(uuid).await;
        Ok(info)
    }

    /// Version checks for a record in `Uninitialized`, moving it to
    /// `Inactive`, `OutOfDate`, or `Error`.
    fn validate_record(&self, st: &mut ManagerState, uuid: &str) -> Validation {
        let Some(record) = st.registry.get_mut(uuid) else {
            return Validation::Unknown;
        };
        if record.state() != ExtensionState::Uninitialized {
            return Validation::Settled(!record.state().is_failure());
        }

        if st.check_version && !record.metadata.supports_shell_major(&self.shell_major) {
            info!(
                uuid = %uuid,
                shell_major = %self.shell_major,
                declared = ?record.metadata.shell_version,
                "Extension is not compatible with the current shell version"
            );
            record.transition(ExtensionState::OutOfDate);
            Self::refresh_can_change(st, uuid);
            return Validation::Rejected;
        }

        let version = record.metadata.version.clone();
        if let Err(e) = st.registry.check_unloaded_version(uuid, &version) {
            error!(uuid = %uuid, error = %e, "Extension version conflicts with resident code");
            if let Some(record) = st.registry.get_mut(uuid) {
                record.fail(e.to_string());
            }
            Self::refresh_can_change(st, uuid);
            return Validation::Rejected;
        }

        let Some(record) = st.registry.get_mut(uuid) else {
            return Validation::Unknown;
        };
        record.transition(ExtensionState::Inactive);
        let modes = record.session_modes();
        Self::refresh_can_change(st, uuid);

        let wanted = st.desired.iter().any(|u| u == uuid)
            && st.session.allow_extensions
            && st.session.supports(&modes);
        Validation::Ready { wanted }
    }

    async fn load_record_inner(&self, turn: &mut Turn<'_>, uuid: &str) -> bool {
        let validation = {
            let mut st = self.state();
            self.validate_record(&mut st, uuid)
        };

        match validation {
            Validation::Unknown => {
                warn!(uuid = %uuid, "Cannot load unknown extension");
                false
            }
            Validation::Settled(healthy) => healthy,
            Validation::Rejected => {
                self.emit_state(uuid).await;
                false
            }
            // initialization and activation notify for the state they end in
            Validation::Ready { wanted: true } => {
                if self.initialize_inner(uuid).await {
                    self.activate_inner(turn, uuid).await;
                }
                let state = self.state().registry.state(uuid);
                state.is_some_and(|state| !state.is_failure())
            }
            Validation::Ready { wanted: false } => {
                self.emit_state(uuid).await;
                true
            }
        }
    }

    /// Imports the extension's code and constructs its object. Never
    /// imports twice for the same record.
    async fn initialize_inner(&self, uuid: &str) -> bool {
        let target = {
            let st = self.state();
            match st.registry.get(uuid) {
                Some(record) if record.module.is_some() => return true,
                Some(record) if record.imported => return false,
                Some(record) => (record.info(), record.dir.clone()),
                None => return false,
            }
        };
        let (info, dir) = target;

        let result = self.module_loader.import_module(&info, &dir).await;

        let initialized = {
            let mut guard = self.state();
            let st = &mut *guard;
            let Some(record) = st.registry.get_mut(uuid) else {
                return false;
            };
            match result {
                Ok(module) => {
                    record.set_module(module);
                    debug!(uuid = %uuid, "Extension initialized");
                    true
                }
                Err(e) => {
                    if matches!(e, ExtensionError::Construction { .. }) {
                        record.imported = true;
                    }
                    error!(uuid = %uuid, error = %e, "Failed to initialize extension");
                    record.fail(e.to_string());
                    Self::refresh_can_change(st, uuid);
                    false
                }
            }
        };

        if initialized {
            self.emit_loaded(uuid).await;
        } else {
            self.emit_state(uuid).await;
        }
        initialized
    }

    async fn activate_inner(&self, turn: &mut Turn<'_>, uuid: &str) -> bool {
        self.settle(turn, uuid).await;

        let target = {
            let st = self.state();
            st.registry.get(uuid).map(|r| {
                let supported =
                    st.session.allow_extensions && st.session.supports(&r.session_modes());
                (r.state(), supported, st.session.name.clone())
            })
        };
        let Some((state, supported, session_name)) = target else {
            debug!(uuid = %uuid, "Ignoring activation of unknown extension");
            return false;
        };

        if !supported {
            debug!(uuid = %uuid, session_mode = %session_name, "Extension not allowed in session mode");
            return false;
        }
        match state {
            ExtensionState::Active => return true,
            ExtensionState::Inactive => {}
            _ => return false,
        }

        if !self.initialize_inner(uuid).await {
            return false;
        }

        let info = {
            let mut st = self.state();
            let Some(record) = st.registry.get_mut(uuid) else {
                return false;
            };
            record.transition(ExtensionState::Activating);
            record.info()
        };
        self.emit_state(uuid).await;

        let stylesheet = match self.stylesheets.load_stylesheet(&info, &session_name).await {
            Ok(path) => path,
            Err(e) => {
                error!(uuid = %uuid, error = %e, "Failed to load stylesheet");
                self.fail_record(uuid, e.to_string());
                self.emit_state(uuid).await;
                return false;
            }
        };

        let module = {
            let mut st = self.state();
            let Some(record) = st.registry.get_mut(uuid) else {
                return false;
            };
            record.stylesheet = stylesheet;
            record.module.clone()
        };

        match self.call_module(turn, module, ModuleCall::Enable).await {
            Ok(()) => {
                {
                    let mut guard = self.state();
                    let st = &mut *guard;
                    if let Some(record) = st.registry.get_mut(uuid) {
                        record.transition(ExtensionState::Active);
                    }
                    st.registry.push_enabled(uuid);
                    Self::refresh_can_change(st, uuid);
                }
                info!(uuid = %uuid, "Extension enabled");
                self.emit_state(uuid).await;
                true
            }
            Err(reason) => {
                let e = ExtensionError::Enable {
                    uuid: uuid.to_string(),
                    reason,
                };
                error!(uuid = %uuid, error = %e, "Extension failed to enable");
                {
                    let mut st = self.state();
                    if let Some(record) = st.registry.get_mut(uuid) {
                        record.stylesheet = None;
                    }
                }
                self.stylesheets.unload_stylesheet(uuid).await;
                self.fail_record(uuid, e.to_string());
                self.emit_state(uuid).await;
                false
            }
        }
    }

    /// Disables a single active extension and drops it from the enable
    /// order. Returns whether `disable()` succeeded.
    async fn disable_one(&self, turn: &mut Turn<'_>, uuid: &str) -> bool {
        self.settle(turn, uuid).await;

        let module = {
            let mut st = self.state();
            let Some(record) = st.registry.get_mut(uuid) else {
                return false;
            };
            if record.state() != ExtensionState::Active {
                return false;
            }
            record.transition(ExtensionState::Deactivating);
            record.stylesheet = None;
            let module = record.module.clone();
            st.registry.remove_enabled(uuid);
            module
        };
        self.emit_state(uuid).await;

        self.stylesheets.unload_stylesheet(uuid).await;

        let disabled = match self.call_module(turn, module, ModuleCall::Disable).await {
            Ok(()) => {
                let mut st = self.state();
                if let Some(record) = st.registry.get_mut(uuid) {
                    record.transition(ExtensionState::Inactive);
                }
                debug!(uuid = %uuid, "Extension disabled");
                true
            }
            Err(reason) => {
                let e = ExtensionError::Disable {
                    uuid: uuid.to_string(),
                    reason,
                };
                error!(uuid = %uuid, error = %e, "Extension failed to disable");
                self.fail_record(uuid, e.to_string());
                false
            }
        };
        self.emit_state(uuid).await;
        disabled
    }

    async fn deactivate_inner(&self, turn: &mut Turn<'_>, uuid: &str) -> bool {
        self.settle(turn, uuid).await;

        let downstream = {
            let st = self.state();
            if st.registry.state(uuid) != Some(ExtensionState::Active) {
                return false;
            }
            st.registry.downstream_of(uuid).unwrap_or_default()
        };

        // newest first
        let mut rebased = Vec::new();
        for other in downstream.iter().rev() {
            if self.disable_one(turn, other).await {
                rebased.push(other.clone());
            }
        }

        self.disable_one(turn, uuid).await;
        info!(uuid = %uuid, rebased = rebased.len(), "Extension deactivated");

        for other in rebased.iter().rev() {
            if !self.activate_inner(turn, other).await {
                warn!(uuid = %other, "Extension did not come back after rebasing");
            }
        }

        true
    }

    async fn unload_inner(&self, turn: &mut Turn<'_>, uuid: &str) -> Result<(), ExtensionError> {
        self.settle(turn, uuid).await;

        let active = self.state().registry.state(uuid) == Some(ExtensionState::Active);
        if active {
            self.deactivate_inner(turn, uuid).await;
        }

        let removed = self.state().registry.remove(uuid);
        let mut record = removed.ok_or_else(|| ExtensionError::NotFound(uuid.to_string()))?;

        if record.stylesheet.take().is_some() {
            self.stylesheets.unload_stylesheet(uuid).await;
        }
        record.transition(ExtensionState::Uninstalled);
        self.state().registry.note_unloaded(&record);

        let extension = record.info();
        self.events
            .publish(ExtensionEvent::StateChanged { extension })
            .await;
        info!(uuid = %uuid, "Extension unloaded");
        Ok(())
    }

    async fn reload_inner(&self, turn: &mut Turn<'_>, uuid: &str) -> Result<bool, ExtensionError> {
        let target = {
            let st = self.state();
            st.registry.get(uuid).map(|r| (r.dir.clone(), r.origin))
        };
        let (dir, origin) = target.ok_or_else(|| ExtensionError::NotFound(uuid.to_string()))?;

        self.unload_inner(turn, uuid).await?;

        if let Err(e) = self.create_record_inner(uuid, &dir, origin).await {
            error!(uuid = %uuid, error = %e, "Could not reload extension");
            return Err(e);
        }

        Ok(self.load_record_inner(turn, uuid).await)
    }

    async fn disable_all_inner(&self, turn: &mut Turn<'_>) {
        let order = self.state().registry.enable_order().to_vec();
        for uuid in order.iter().rev() {
            self.deactivate_inner(turn, uuid).await;
        }
        debug!(count = order.len(), "All extensions disabled");
    }

    async fn reconcile_inner(&self, turn: &mut Turn<'_>) {
        let previous = self.refresh_settings().await;
        self.refresh_flags(false).await;

        let unwanted = {
            let st = self.state();
            if !st.session.allow_extensions {
                return;
            }
            let unwanted: Vec<String> = st
                .registry
                .enable_order()
                .iter()
                .filter(|uuid| {
                    let supported = st
                        .registry
                        .get(uuid)
                        .is_some_and(|r| st.session.supports(&r.session_modes()));
                    !supported || !st.desired.contains(uuid)
                })
                .cloned()
                .collect();
            unwanted
        };

        for uuid in unwanted.iter().rev() {
            self.deactivate_inner(turn, uuid).await;
        }

        let wanted = {
            let st = self.state();
            Self::desired_where(&st, |uuid, _| !previous.iter().any(|p| p == uuid))
        };

        for uuid in &wanted {
            self.activate_inner(turn, uuid).await;
        }

        if !unwanted.is_empty() || !wanted.is_empty() {
            info!(
                disabled = unwanted.len(),
                enabled = wanted.len(),
                "Desired extension set reconciled"
            );
        }
    }

    async fn handle_major_version_upgrade_inner(&self, turn: &mut Turn<'_>) -> AppResult<bool> {
        let Some(marker) = &self.marker else {
            return Ok(false);
        };
        if !marker.mark().await? {
            return Ok(false);
        }

        info!(shell_major = %self.shell_major, "Handling major shell version upgrade");

        let previous = self.state().registry.enable_order().to_vec();
        self.disable_all_inner(turn).await;

        let installed = match &self.updates {
            Some(updates) => {
                let pending = updates.check_for_updates().await;
                match pending {
                    Ok(pending) if !pending.is_empty() => {
                        match updates.install_pending_updates().await {
                            Ok(installed) => installed,
                            Err(e) => {
                                warn!(error = %e, "Failed to install extension updates");
                                Vec::new()
                            }
                        }
                    }
                    Ok(_) => Vec::new(),
                    Err(e) => {
                        warn!(error = %e, "Failed to check for extension updates");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        for uuid in &installed {
            let target = {
                let st = self.state();
                st.registry.get(uuid).map(|r| (r.dir.clone(), r.origin))
            };
            let Some((dir, origin)) = target else {
                continue;
            };
            self.unload_inner(turn, uuid).await?;
            // the installed code supersedes whatever was resident
            self.state().registry.forget_unloaded(uuid);
            if let Err(e) = self.create_record_inner(uuid, &dir, origin).await {
                warn!(uuid = %uuid, error = %e, "Updated extension could not be registered");
            }
        }

        for uuid in &previous {
            let state = self.state().registry.state(uuid);
            match state {
                Some(ExtensionState::Uninitialized) => {
                    self.load_record_inner(turn, uuid).await;
                }
                Some(_) => {
                    if !self.activate_inner(turn, uuid).await {
                        warn!(uuid = %uuid, "Failed to re-enable extension");
                    }
                }
                None => {}
            }
        }

        let initialized = self.state().initialized;
        if initialized {
            for uuid in &installed {
                let state = self.state().registry.state(uuid);
                if state == Some(ExtensionState::Uninitialized) {
                    self.load_record_inner(turn, uuid).await;
                }
            }
        }

        Ok(true)
    }
}
