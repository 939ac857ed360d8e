//! Convenience result type alias for the extension host.

use crate::error::AppError;

/// A specialized `Result` type for host-level operations.
///
/// Extension lifecycle failures use [`crate::error::ExtensionError`]
/// and are converted at the boundary.
pub type AppResult<T> = Result<T, AppError>;
