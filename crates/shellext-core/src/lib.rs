//! # shellext-core
//!
//! Core crate for the shell extension host. Contains the collaborator
//! traits, configuration schemas, extension metadata and state types,
//! lifecycle events, and the unified error system.
//!
//! This crate has **no** internal dependencies on other workspace crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ExtensionError};
pub use result::AppResult;
