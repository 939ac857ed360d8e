//! `shellext enable <uuid>` and `shellext disable <uuid>`
//!
//! Both edit the settings file; a running host picks the change up on
//! its next poll.

use clap::Args;

use shellext_core::error::AppError;
use shellext_core::traits::SettingsStore;
use shellext_lifecycle::settings::FileSettings;

use crate::output;

/// Arguments for enable/disable
#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Extension UUID
    pub uuid: String,
}

async fn open(config_path: &str, uuid: &str) -> Result<FileSettings, AppError> {
    let config = super::load_config(config_path)?;
    super::find(&config, uuid).await?;

    let settings = FileSettings::open(
        &config.extensions.settings_file,
        config.extensions.settings_read_only,
    )
    .await?;
    Ok(settings)
}

/// Execute the enable command
pub async fn enable(args: &ToggleArgs, config_path: &str) -> Result<(), AppError> {
    let settings = open(config_path, &args.uuid).await?;

    let mut disabled = settings.disabled_extensions().await;
    if disabled.contains(&args.uuid) {
        disabled.retain(|u| u != &args.uuid);
        settings.set_disabled_extensions(disabled).await?;
    }

    let mut enabled = settings.enabled_extensions().await;
    if !enabled.contains(&args.uuid) {
        enabled.push(args.uuid.clone());
        settings.set_enabled_extensions(enabled).await?;
    }

    output::print_success(&format!("Extension '{}' enabled", args.uuid));
    Ok(())
}

/// Execute the disable command
pub async fn disable(args: &ToggleArgs, config_path: &str) -> Result<(), AppError> {
    let settings = open(config_path, &args.uuid).await?;

    let mut enabled = settings.enabled_extensions().await;
    if enabled.contains(&args.uuid) {
        enabled.retain(|u| u != &args.uuid);
        settings.set_enabled_extensions(enabled).await?;
    }

    let mut disabled = settings.disabled_extensions().await;
    if !disabled.contains(&args.uuid) {
        disabled.push(args.uuid.clone());
        settings.set_disabled_extensions(disabled).await?;
    }

    output::print_success(&format!("Extension '{}' disabled", args.uuid));
    Ok(())
}
