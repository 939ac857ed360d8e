//! Shared test helpers for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use shellext_core::traits::ExtensionModule;
use shellext_core::types::{ExtensionState, SessionMode};
use shellext_lifecycle::{
    ExtensionFinder, ExtensionManager, ExtensionManagerBuilder, MemorySettings,
    StaticModuleLoader, ThemeStylesheets,
};

/// Shell version every test host runs.
pub const SHELL_VERSION: &str = "46.1";

/// Ordered log of `<uuid>.enable` / `<uuid>.disable` calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Ids whose `enable` / `disable` should fail.
#[derive(Debug, Default)]
pub struct Failures {
    enable: Mutex<HashSet<String>>,
    disable: Mutex<HashSet<String>>,
}

/// Extension object recording every call it receives.
#[derive(Debug)]
pub struct FakeModule {
    uuid: String,
    log: CallLog,
    failures: Arc<Failures>,
}

#[async_trait]
impl ExtensionModule for FakeModule {
    async fn enable(&mut self) -> Result<(), String> {
        self.log.lock().unwrap().push(format!("{}.enable", self.uuid));
        if self.failures.enable.lock().unwrap().contains(&self.uuid) {
            return Err(format!("{} refused to enable", self.uuid));
        }
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), String> {
        self.log.lock().unwrap().push(format!("{}.disable", self.uuid));
        if self.failures.disable.lock().unwrap().contains(&self.uuid) {
            return Err(format!("{} refused to disable", self.uuid));
        }
        Ok(())
    }
}

/// Extension object whose `enable` never completes.
#[derive(Debug)]
pub struct StalledModule;

#[async_trait]
impl ExtensionModule for StalledModule {
    async fn enable(&mut self) -> Result<(), String> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), String> {
        Ok(())
    }
}

/// Temporary extension tree with a recording module loader.
pub struct TestHost {
    /// Keeps the temp tree alive.
    pub root: TempDir,
    /// Per-user extension directory.
    pub user_dir: PathBuf,
    /// System extension directory.
    pub system_dir: PathBuf,
    /// Staged updates directory.
    pub updates_dir: PathBuf,
    /// Host data directory.
    pub data_dir: PathBuf,
    pub loader: Arc<StaticModuleLoader>,
    pub settings: Arc<MemorySettings>,
    pub stylesheets: Arc<ThemeStylesheets>,
    pub log: CallLog,
    /// Ids in the order their factories ran.
    pub imports: Arc<Mutex<Vec<String>>>,
    pub failures: Arc<Failures>,
}

impl TestHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("temp dir");
        let user_dir = root.path().join("user");
        let system_dir = root.path().join("system");
        let updates_dir = root.path().join("updates");
        let data_dir = root.path().join("data");

        Self {
            root,
            user_dir,
            system_dir,
            updates_dir,
            data_dir,
            loader: Arc::new(StaticModuleLoader::new()),
            settings: Arc::new(MemorySettings::new()),
            stylesheets: Arc::new(ThemeStylesheets::new()),
            log: Arc::new(Mutex::new(Vec::new())),
            imports: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Failures::default()),
        }
    }

    /// Manifest for `uuid` declaring the given shell versions.
    pub fn manifest(uuid: &str, shell_versions: &[&str]) -> Value {
        json!({
            "uuid": uuid,
            "name": uuid,
            "description": "test extension",
            "shell-version": shell_versions,
            "version": 1,
        })
    }

    /// Installs a compatible per-user extension with a working module.
    pub async fn install(&self, uuid: &str) -> PathBuf {
        self.install_manifest(&self.user_dir, uuid, Self::manifest(uuid, &["46"]))
            .await
    }

    /// Writes `manifest` under `base/uuid` and registers a module factory.
    pub async fn install_manifest(&self, base: &std::path::Path, uuid: &str, manifest: Value) -> PathBuf {
        let dir = base.join(uuid);
        write_manifest(&dir, &manifest).await;
        self.register(uuid).await;
        dir
    }

    /// Registers a recording module factory for `uuid`.
    pub async fn register(&self, uuid: &str) {
        let log = self.log.clone();
        let imports = self.imports.clone();
        let failures = self.failures.clone();
        self.loader
            .register(uuid, move |info| {
                imports.lock().unwrap().push(info.uuid.clone());
                Ok(Box::new(FakeModule {
                    uuid: info.uuid.clone(),
                    log: log.clone(),
                    failures: failures.clone(),
                }) as Box<dyn ExtensionModule>)
            })
            .await;
    }

    /// Installs a compatible per-user extension whose `enable` hangs.
    pub async fn install_stalled(&self, uuid: &str) -> PathBuf {
        let dir = self.user_dir.join(uuid);
        write_manifest(&dir, &Self::manifest(uuid, &["46"])).await;
        self.loader
            .register(uuid, |_| Ok(Box::new(StalledModule) as Box<dyn ExtensionModule>))
            .await;
        dir
    }

    /// Sets the enabled list.
    pub async fn enable_in_settings(&self, uuids: &[&str]) {
        use shellext_core::traits::SettingsStore;
        self.settings
            .set_enabled_extensions(uuids.iter().map(|u| u.to_string()).collect())
            .await
            .expect("settings writable");
    }

    /// Builder with every test collaborator wired in.
    pub fn builder(&self) -> ExtensionManagerBuilder {
        ExtensionManager::builder()
            .shell_version(SHELL_VERSION)
            .session_mode(SessionMode::user())
            .module_loader(self.loader.clone())
            .settings(self.settings.clone())
            .stylesheets(self.stylesheets.clone())
            .finder(ExtensionFinder::new(
                &self.user_dir,
                vec![self.system_dir.clone()],
            ))
    }

    /// Builds a manager and loads every installed extension.
    pub async fn start(&self) -> ExtensionManager {
        let manager = self.builder().build().await.expect("manager builds");
        manager.load_extensions().await.expect("extensions load");
        manager
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Makes `enable()` of `uuid` fail from now on.
    pub fn fail_enable(&self, uuid: &str) {
        self.failures.enable.lock().unwrap().insert(uuid.to_string());
    }

    /// Makes `disable()` of `uuid` fail from now on.
    pub fn fail_disable(&self, uuid: &str) {
        self.failures.disable.lock().unwrap().insert(uuid.to_string());
    }

    /// Number of times the module of `uuid` was constructed.
    pub fn import_count(&self, uuid: &str) -> usize {
        self.imports.lock().unwrap().iter().filter(|u| *u == uuid).count()
    }
}

/// Writes `metadata.json` into `dir`.
pub async fn write_manifest(dir: &std::path::Path, manifest: &Value) {
    tokio::fs::create_dir_all(dir).await.expect("create extension dir");
    tokio::fs::write(
        dir.join("metadata.json"),
        serde_json::to_string_pretty(manifest).expect("manifest json"),
    )
    .await
    .expect("write manifest");
}

/// State of `uuid`, panicking if unknown.
pub async fn state(manager: &ExtensionManager, uuid: &str) -> ExtensionState {
    manager
        .lookup(uuid)
        .await
        .unwrap_or_else(|| panic!("{uuid} is not registered"))
        .state
}

/// Polls until `uuid` reaches `expected`, failing after a second.
pub async fn wait_for_state(manager: &ExtensionManager, uuid: &str, expected: ExtensionState) {
    for _ in 0..100 {
        if manager.lookup(uuid).await.map(|i| i.state) == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{uuid} never reached {expected}");
}

/// Asserts the enable order holds exactly the active ids, once each.
pub async fn assert_order_consistent(manager: &ExtensionManager) {
    let order = manager.enable_order().await;
    let unique: HashSet<&String> = order.iter().collect();
    assert_eq!(unique.len(), order.len(), "duplicate ids in {order:?}");

    let active: HashSet<String> = manager
        .list()
        .await
        .into_iter()
        .filter(|info| info.state == ExtensionState::Active)
        .map(|info| info.uuid)
        .collect();
    let ordered: HashSet<String> = order.into_iter().collect();
    assert_eq!(active, ordered);
}

/// Strings from string slices.
pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
