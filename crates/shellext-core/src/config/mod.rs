//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every section has defaults so an empty file is valid.

pub mod extensions;
pub mod logging;
pub mod shell;

use serde::{Deserialize, Serialize};

use self::extensions::ExtensionsConfig;
use self::logging::LoggingConfig;
use self::shell::ShellConfig;

use crate::error::AppError;
use crate::types::SessionMode;

/// Prefix of environment variables overriding configuration values.
pub const ENV_PREFIX: &str = "SHELLEXT";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shell runtime settings.
    #[serde(default)]
    pub shell: ShellConfig,
    /// Initial session mode.
    #[serde(default)]
    pub session: SessionMode,
    /// Extension discovery and persistence locations.
    #[serde(default)]
    pub extensions: ExtensionsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a single TOML file plus environment
    /// variables prefixed with `SHELLEXT__`.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Load `config/default` merged with the `config/{env}` overlay and
    /// environment variables.
    pub fn load_layered(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
