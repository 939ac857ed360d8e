//! Error types for the extension host.
//!
//! [`ExtensionError`] is the lifecycle taxonomy: it is recorded on extension
//! records and never escapes a multi-extension operation. [`AppError`] is the
//! host-wide error used at process boundaries (configuration, I/O, CLI) and
//! every `ExtensionError` converts into it.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::metadata::MetadataVersion;

/// Top-level error kind categorization used across the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested extension or resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A conflict occurred (duplicate id, version conflict).
    Conflict,
    /// An internal error occurred.
    Internal,
    /// A configuration error occurred.
    Configuration,
    /// An extension failed to load or change state.
    Extension,
    /// The settings store rejected a read or write.
    Settings,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A filesystem I/O error occurred.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Extension => write!(f, "EXTENSION"),
            Self::Settings => write!(f, "SETTINGS"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Io => write!(f, "IO"),
        }
    }
}

/// The unified application error used at host boundaries.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Io, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<ExtensionError> for AppError {
    fn from(err: ExtensionError) -> Self {
        let kind = match &err {
            ExtensionError::NotFound(_) => ErrorKind::NotFound,
            ExtensionError::DuplicateId { .. } | ExtensionError::VersionConflict { .. } => {
                ErrorKind::Conflict
            }
            ExtensionError::Settings(_) => ErrorKind::Settings,
            ExtensionError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Extension,
        };
        Self::new(kind, err.to_string())
    }
}

/// Failures surfaced by the extension lifecycle.
///
/// Messages are kept as strings so records can store and clone them and
/// so extension code never has to share an error type with the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    /// `metadata.json` is missing, unreadable, or fails validation.
    #[error("Invalid metadata for {uuid}: {reason}")]
    Metadata {
        /// Extension id.
        uuid: String,
        /// What was wrong with the manifest.
        reason: String,
    },

    /// An extension with this id is already registered.
    #[error("Extension {uuid} already installed in {}", existing.display())]
    DuplicateId {
        /// Extension id.
        uuid: String,
        /// Directory of the registration that won.
        existing: PathBuf,
    },

    /// No code entry point exists where the module loader expects one.
    #[error("Missing {entrypoint} for {uuid}")]
    MissingEntrypoint {
        /// Extension id.
        uuid: String,
        /// The entry point that was looked for.
        entrypoint: String,
    },

    /// Importing the code unit failed.
    #[error("Failed to import {uuid}: {reason}")]
    ModuleLoad {
        /// Extension id.
        uuid: String,
        /// Loader diagnostic.
        reason: String,
    },

    /// The code unit was imported but constructing the extension object failed.
    #[error("Failed to construct {uuid}: {reason}")]
    Construction {
        /// Extension id.
        uuid: String,
        /// Constructor diagnostic.
        reason: String,
    },

    /// A different version of this id was imported earlier in this process.
    #[error(
        "A different version of {uuid} was loaded previously (loaded {}, found {}). Log out for changes to take effect",
        display_version(loaded),
        display_version(requested)
    )]
    VersionConflict {
        /// Extension id.
        uuid: String,
        /// Version that was imported before.
        loaded: Option<MetadataVersion>,
        /// Version found now.
        requested: Option<MetadataVersion>,
    },

    /// A stylesheet exists but could not be loaded.
    #[error("Failed to load stylesheet {} for {uuid}: {reason}", path.display())]
    Stylesheet {
        /// Extension id.
        uuid: String,
        /// Stylesheet path.
        path: PathBuf,
        /// Loader diagnostic.
        reason: String,
    },

    /// Extension code failed in `enable()`.
    #[error("{uuid} failed to enable: {reason}")]
    Enable {
        /// Extension id.
        uuid: String,
        /// Message returned by the extension.
        reason: String,
    },

    /// Extension code failed in `disable()`.
    #[error("{uuid} failed to disable: {reason}")]
    Disable {
        /// Extension id.
        uuid: String,
        /// Message returned by the extension.
        reason: String,
    },

    /// No record exists for the id.
    #[error("Extension {0} not found")]
    NotFound(String),

    /// The settings store failed.
    #[error("Settings error: {0}")]
    Settings(String),

    /// Filesystem failure outside of manifest loading.
    #[error("I/O error: {0}")]
    Io(String),
}

fn display_version(version: &Option<MetadataVersion>) -> String {
    version
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unversioned".to_string())
}

impl From<std::io::Error> for ExtensionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
