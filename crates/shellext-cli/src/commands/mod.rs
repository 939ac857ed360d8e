//! CLI command definitions and dispatch.
//!
//! The CLI works on the files the host reads: it scans extension
//! directories, parses manifests, and edits the settings file. It never
//! imports extension code.

pub mod config;
pub mod info;
pub mod list;
pub mod toggle;
pub mod uninstall;

use clap::{Parser, Subcommand};
use serde::Serialize;

use shellext_core::config::AppConfig;
use shellext_core::error::{AppError, ExtensionError};
use shellext_core::traits::MetadataLoader;
use shellext_core::types::{ExtensionMetadata, SessionMode};
use shellext_lifecycle::finder::{DiscoveredExtension, ExtensionFinder};
use shellext_lifecycle::metadata::JsonMetadataLoader;
use shellext_lifecycle::policy::{self, SettingsSnapshot};
use shellext_lifecycle::settings::SettingsValues;
use shellext_lifecycle::settings::file::read_values;

use crate::output::OutputFormat;

/// Shell extension management
#[derive(Debug, Parser)]
#[command(name = "shellext", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List installed extensions
    List(list::ListArgs),
    /// Show details of one extension
    Info(info::InfoArgs),
    /// Enable an extension
    Enable(toggle::ToggleArgs),
    /// Disable an extension
    Disable(toggle::ToggleArgs),
    /// Remove a per-user extension
    Uninstall(uninstall::UninstallArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::List(args) => list::execute(args, &self.config, self.format).await,
            Commands::Info(args) => info::execute(args, &self.config, self.format).await,
            Commands::Enable(args) => toggle::enable(args, &self.config).await,
            Commands::Disable(args) => toggle::disable(args, &self.config).await,
            Commands::Uninstall(args) => uninstall::execute(args, &self.config).await,
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// How the host would treat an extension, judged from files alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Wanted by settings or the session mode.
    Enabled,
    /// Not wanted.
    Disabled,
    /// Declares no compatible shell version.
    OutOfDate,
    /// Manifest missing or invalid.
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::OutOfDate => write!(f, "out of date"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One installed extension with its manifest, if readable.
#[derive(Debug)]
pub struct Installed {
    /// Where it was found.
    pub found: DiscoveredExtension,
    /// Parsed manifest, or why it could not be read.
    pub metadata: Result<ExtensionMetadata, ExtensionError>,
    /// Derived status.
    pub status: Status,
}

/// Scans the configured directories and reads every manifest.
pub async fn inventory(config: &AppConfig) -> Result<Vec<Installed>, AppError> {
    let settings = read_values(std::path::Path::new(&config.extensions.settings_file)).await?;
    let finder = ExtensionFinder::from_config(&config.extensions);
    let loader = JsonMetadataLoader::new();

    let mut installed = Vec::new();
    for found in finder.scan().await? {
        let metadata = loader.load_metadata(&found.uuid, &found.dir).await;
        let status = status_of(
            &found.uuid,
            metadata.as_ref().ok(),
            config.shell.major(),
            &config.session,
            &settings,
        );
        installed.push(Installed {
            found,
            metadata,
            status,
        });
    }
    Ok(installed)
}

/// Finds one installed extension by id.
pub async fn find(config: &AppConfig, uuid: &str) -> Result<Installed, AppError> {
    inventory(config)
        .await?
        .into_iter()
        .find(|i| i.found.uuid == uuid)
        .ok_or_else(|| AppError::not_found(format!("Extension '{uuid}' is not installed")))
}

/// Status the host would give an extension on startup.
pub fn status_of(
    uuid: &str,
    metadata: Option<&ExtensionMetadata>,
    shell_major: &str,
    session: &SessionMode,
    settings: &SettingsValues,
) -> Status {
    let Some(metadata) = metadata else {
        return Status::Error;
    };

    if !settings.disable_extension_version_validation
        && !metadata.supports_shell_major(shell_major)
    {
        return Status::OutOfDate;
    }

    let snapshot = SettingsSnapshot {
        enabled: settings.enabled_extensions.clone(),
        disabled: settings.disabled_extensions.clone(),
        user_extensions_disabled: settings.disable_user_extensions,
        version_validation_disabled: settings.disable_extension_version_validation,
        ..Default::default()
    };
    if policy::desired_extensions(session, &snapshot)
        .iter()
        .any(|u| u == uuid)
    {
        Status::Enabled
    } else {
        Status::Disabled
    }
}
