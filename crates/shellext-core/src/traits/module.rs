//! Extension code units.

use std::path::Path;

use async_trait::async_trait;

use crate::error::ExtensionError;
use crate::types::ExtensionInfo;

/// A constructed extension object.
///
/// The manager owns each instance exclusively and never calls `enable`
/// or `disable` concurrently on the same instance.
#[async_trait]
pub trait ExtensionModule: Send + std::fmt::Debug {
    /// Activates the extension.
    async fn enable(&mut self) -> Result<(), String>;

    /// Deactivates the extension, undoing everything `enable` did.
    async fn disable(&mut self) -> Result<(), String>;
}

/// Imports an extension's code and constructs its extension object.
#[async_trait]
pub trait ModuleLoader: Send + Sync + std::fmt::Debug + 'static {
    /// Imports the module for `extension` from `dir`.
    ///
    /// Fails with [`ExtensionError::MissingEntrypoint`] when there is no
    /// code to import, [`ExtensionError::ModuleLoad`] when importing fails,
    /// and [`ExtensionError::Construction`] when the code was imported but
    /// building the extension object failed.
    async fn import_module(
        &self,
        extension: &ExtensionInfo,
        dir: &Path,
    ) -> Result<Box<dyn ExtensionModule>, ExtensionError>;
}
