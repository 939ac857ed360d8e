//! Collaborator traits defined in `shellext-core` and implemented by
//! `shellext-lifecycle` (or by test doubles).

pub mod metadata;
pub mod module;
pub mod settings;
pub mod stylesheet;
pub mod updates;

pub use metadata::MetadataLoader;
pub use module::{ExtensionModule, ModuleLoader};
pub use settings::{SettingsChange, SettingsKey, SettingsStore};
pub use stylesheet::StylesheetLoader;
pub use updates::{UpdateSource, UpgradeMarker};
