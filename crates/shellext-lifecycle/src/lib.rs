//! # shellext-lifecycle
//!
//! Extension lifecycle management for the shell. Provides:
//!
//! - The extension manager state machine (load, enable, disable, reload)
//! - LIFO enable-order rebasing
//! - Desired-set reconciliation against settings and the session mode
//! - Directory discovery and `metadata.json` loading
//! - In-memory and file-backed settings stores
//! - Stylesheet loading, staged updates, and the major-version marker
//! - Optional dynamic loading via `libloading` (feature `dynamic`)

pub mod events;
pub mod finder;
pub mod loader;
pub mod macros;
pub mod manager;
pub mod metadata;
pub mod policy;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod settings;
pub mod stylesheet;
pub mod updates;

pub use events::{ClosureHandler, EventBus, ExtensionEventHandler, SubscriptionId};
pub use finder::{DiscoveredExtension, ExtensionFinder};
pub use loader::StaticModuleLoader;
pub use manager::{ExtensionManager, ExtensionManagerBuilder};
pub use metadata::JsonMetadataLoader;
pub use registry::ExtensionRegistry;
pub use settings::{FileSettings, MemorySettings, SettingsValues};
pub use stylesheet::ThemeStylesheets;
pub use updates::{MarkerFile, StagedUpdates};

#[cfg(feature = "dynamic")]
pub use loader::DynamicModuleLoader;
