//! `shellext uninstall <uuid>`

use clap::Args;

use shellext_core::error::AppError;
use shellext_core::types::ExtensionOrigin;

use crate::output;

/// Arguments for the uninstall command
#[derive(Debug, Args)]
pub struct UninstallArgs {
    /// Extension UUID
    pub uuid: String,

    /// Skip confirmation
    #[arg(long)]
    pub force: bool,
}

/// Execute the uninstall command
pub async fn execute(args: &UninstallArgs, config_path: &str) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let installed = super::find(&config, &args.uuid).await?;

    if installed.found.origin != ExtensionOrigin::PerUser {
        return Err(AppError::validation(format!(
            "Extension '{}' is a system extension and cannot be uninstalled",
            args.uuid
        )));
    }

    if !args.force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Remove {} from {}?",
                args.uuid,
                installed.found.dir.display()
            ))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    tokio::fs::remove_dir_all(&installed.found.dir).await?;

    output::print_success(&format!("Extension '{}' uninstalled", args.uuid));
    Ok(())
}
