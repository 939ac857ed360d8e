//! `shellext info <uuid>`

use clap::Args;
use serde_json::json;

use shellext_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the info command
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Extension UUID
    pub uuid: String,
}

/// Execute the info command
pub async fn execute(args: &InfoArgs, config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let installed = super::find(&config, &args.uuid).await?;

    if format == OutputFormat::Json {
        output::print_json(&json!({
            "uuid": installed.found.uuid,
            "path": installed.found.dir,
            "origin": installed.found.origin,
            "status": installed.status,
            "metadata": installed.metadata.as_ref().ok(),
            "error": installed.metadata.as_ref().err().map(|e| e.to_string()),
        }));
        return Ok(());
    }

    println!("{}:", installed.found.uuid);
    output::print_kv("Path", &installed.found.dir.display().to_string());
    output::print_kv("Origin", &installed.found.origin.to_string());
    output::print_kv("Status", &installed.status.to_string());

    match &installed.metadata {
        Ok(meta) => {
            output::print_kv("Name", &meta.name);
            output::print_kv("Description", &meta.description);
            if let Some(version) = &meta.version {
                output::print_kv("Version", &version.to_string());
            }
            output::print_kv("Shell versions", &meta.shell_version.join(", "));
            output::print_kv("Session modes", &meta.session_modes().join(", "));
            if let Some(url) = &meta.url {
                output::print_kv("URL", url);
            }
        }
        Err(e) => output::print_warning(&e.to_string()),
    }

    Ok(())
}
