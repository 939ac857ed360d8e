//! Prelude for extension authors.

pub use async_trait::async_trait;

pub use shellext_core::traits::ExtensionModule;
pub use shellext_core::types::{ExtensionInfo, ExtensionMetadata};

pub use crate::loader::{ModuleFactory, StaticModuleLoader};

pub use crate::declare_extension;
