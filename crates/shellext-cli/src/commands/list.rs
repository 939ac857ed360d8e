//! `shellext list`

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use shellext_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the list command
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show enabled extensions
    #[arg(long)]
    pub enabled: bool,
}

/// Extension row for table display
#[derive(Debug, Serialize, Tabled)]
struct ExtensionRow {
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Origin")]
    origin: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Execute the list command
pub async fn execute(args: &ListArgs, config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;

    let rows: Vec<ExtensionRow> = super::inventory(&config)
        .await?
        .into_iter()
        .filter(|i| !args.enabled || i.status == super::Status::Enabled)
        .map(|i| {
            let (name, version) = match &i.metadata {
                Ok(meta) => (
                    meta.name.clone(),
                    meta.version
                        .as_ref()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
                Err(_) => ("-".to_string(), "-".to_string()),
            };
            ExtensionRow {
                uuid: i.found.uuid,
                name,
                version,
                origin: i.found.origin.to_string(),
                status: i.status.to_string(),
            }
        })
        .collect();

    output::print_list(&rows, format);
    Ok(())
}
