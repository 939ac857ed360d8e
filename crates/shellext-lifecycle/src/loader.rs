//! Module loaders: compiled-in factories, and shared libraries via
//! `libloading` (feature-gated).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use shellext_core::error::ExtensionError;
use shellext_core::traits::{ExtensionModule, ModuleLoader};
use shellext_core::types::ExtensionInfo;

/// Constructor for a compiled-in extension.
pub type ModuleFactory =
    dyn Fn(&ExtensionInfo) -> Result<Box<dyn ExtensionModule>, String> + Send + Sync;

/// Loads extensions whose code is compiled into the host.
///
/// The entry point of an extension is its registered factory; an
/// extension without one fails with `MissingEntrypoint`.
#[derive(Default)]
pub struct StaticModuleLoader {
    /// Extension id → factory.
    factories: RwLock<HashMap<String, Arc<ModuleFactory>>>,
}

impl std::fmt::Debug for StaticModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticModuleLoader")
            .field("factories", &"<closures>")
            .finish()
    }
}

impl StaticModuleLoader {
    /// Creates a loader with no factories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for an extension id, replacing any previous one.
    pub async fn register<F>(&self, uuid: &str, factory: F)
    where
        F: Fn(&ExtensionInfo) -> Result<Box<dyn ExtensionModule>, String> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .await
            .insert(uuid.to_string(), Arc::new(factory));
    }

    /// Removes the factory for an extension id.
    pub async fn unregister(&self, uuid: &str) -> bool {
        self.factories.write().await.remove(uuid).is_some()
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn import_module(
        &self,
        extension: &ExtensionInfo,
        _dir: &Path,
    ) -> Result<Box<dyn ExtensionModule>, ExtensionError> {
        let factory = self
            .factories
            .read()
            .await
            .get(&extension.uuid)
            .cloned()
            .ok_or_else(|| ExtensionError::MissingEntrypoint {
                uuid: extension.uuid.clone(),
                entrypoint: "registered module factory".to_string(),
            })?;

        let module = factory(extension).map_err(|reason| ExtensionError::Construction {
            uuid: extension.uuid.clone(),
            reason,
        })?;

        info!(uuid = %extension.uuid, "Compiled-in extension constructed");
        Ok(module)
    }
}

#[cfg(feature = "dynamic")]
pub mod dynamic_loader {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use tracing::info;

    use shellext_core::error::ExtensionError;
    use shellext_core::traits::{ExtensionModule, ModuleLoader};
    use shellext_core::types::ExtensionInfo;

    /// Symbol every dynamic extension exports.
    pub const CREATE_SYMBOL: &[u8] = b"create_extension";

    /// Type of the constructor exported by dynamic extensions.
    ///
    /// Dynamic extensions must export:
    /// `extern "C" fn create_extension() -> *mut Box<dyn ExtensionModule>`,
    /// returning null on failure.
    pub type CreateExtensionFn = unsafe extern "C" fn() -> *mut Box<dyn ExtensionModule>;

    /// An extension object together with the library its code lives in.
    ///
    /// Field order matters: the module is dropped before the library.
    pub struct LibraryModule {
        module: Box<dyn ExtensionModule>,
        library: libloading::Library,
        path: PathBuf,
    }

    impl std::fmt::Debug for LibraryModule {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("LibraryModule")
                .field("module", &self.module)
                .field("library", &self.library)
                .field("path", &self.path)
                .finish()
        }
    }

    #[async_trait]
    impl ExtensionModule for LibraryModule {
        async fn enable(&mut self) -> Result<(), String> {
            self.module.enable().await
        }

        async fn disable(&mut self) -> Result<(), String> {
            self.module.disable().await
        }
    }

    /// Loads extensions from a shared library in the extension directory.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DynamicModuleLoader;

    impl DynamicModuleLoader {
        /// Creates a new dynamic loader.
        pub fn new() -> Self {
            Self
        }

        /// Platform file name of the entry point, e.g. `libextension.so`.
        pub fn entrypoint_name() -> std::ffi::OsString {
            libloading::library_filename("extension")
        }

        /// Loads and constructs the extension in `path`.
        ///
        /// # Safety
        /// This runs arbitrary code from a shared library.
        /// Only load trusted extensions.
        unsafe fn load_from_path(
            uuid: &str,
            path: &Path,
        ) -> Result<Box<dyn ExtensionModule>, ExtensionError> {
            let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
                ExtensionError::ModuleLoad {
                    uuid: uuid.to_string(),
                    reason: format!("failed to load '{}': {e}", path.display()),
                }
            })?;

            let raw = {
                let create: libloading::Symbol<CreateExtensionFn> =
                    unsafe { library.get(CREATE_SYMBOL) }.map_err(|e| {
                        ExtensionError::ModuleLoad {
                            uuid: uuid.to_string(),
                            reason: format!("missing 'create_extension' symbol: {e}"),
                        }
                    })?;
                unsafe { create() }
            };

            if raw.is_null() {
                return Err(ExtensionError::Construction {
                    uuid: uuid.to_string(),
                    reason: "create_extension returned null".to_string(),
                });
            }

            let module = unsafe { *Box::from_raw(raw) };

            info!(uuid = %uuid, path = %path.display(), "Dynamic extension loaded");

            Ok(Box::new(LibraryModule {
                module,
                library,
                path: path.to_path_buf(),
            }))
        }
    }

    #[async_trait]
    impl ModuleLoader for DynamicModuleLoader {
        async fn import_module(
            &self,
            extension: &ExtensionInfo,
            dir: &Path,
        ) -> Result<Box<dyn ExtensionModule>, ExtensionError> {
            let entrypoint = Self::entrypoint_name();
            let path = dir.join(&entrypoint);

            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(ExtensionError::MissingEntrypoint {
                    uuid: extension.uuid.clone(),
                    entrypoint: entrypoint.to_string_lossy().into_owned(),
                });
            }

            // SAFETY: extensions are installed by the user or the system
            // administrator and are trusted to the same degree as the host.
            unsafe { Self::load_from_path(&extension.uuid, &path) }
        }
    }
}

#[cfg(feature = "dynamic")]
pub use dynamic_loader::DynamicModuleLoader;
