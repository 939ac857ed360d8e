//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use shellext_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration file
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            match format {
                OutputFormat::Json => output::print_json(&config),
                OutputFormat::Table => println!("{config:#?}"),
            }
        }
        ConfigCommand::Validate => match super::load_config(config_path) {
            Ok(config) => {
                output::print_success(&format!("Configuration '{config_path}' is valid"));
                output::print_kv("Shell version", &config.shell.version);
                output::print_kv("Session mode", &config.session.name);
                output::print_kv("User extensions", &config.extensions.user_dir);
                output::print_kv("System extensions", &config.extensions.system_dirs.join(", "));
                output::print_kv("Settings file", &config.extensions.settings_file);
                for dir in &config.extensions.system_dirs {
                    if !std::path::Path::new(dir).is_dir() {
                        output::print_warning(&format!("System directory '{dir}' does not exist"));
                    }
                }
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {e}"));
                return Err(e);
            }
        },
    }

    Ok(())
}
