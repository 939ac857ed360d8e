//! Shared extension types.

pub mod info;
pub mod metadata;
pub mod session;
pub mod state;

pub use info::ExtensionInfo;
pub use metadata::{ExtensionMetadata, MetadataVersion};
pub use session::SessionMode;
pub use state::{ExtensionOrigin, ExtensionState};
