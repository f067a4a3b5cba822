//! fleetload CLI main entry point

use anyhow::{Context, Result};
use clap::Parser;
use fleetload_config::{ConfigLoader, LoadTestConfig, LogLevel};
use std::path::PathBuf;
use tracing::{debug, info, warn};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

fn load_config(path: Option<&PathBuf>) -> Result<LoadTestConfig> {
    let loader = ConfigLoader::new();
    match path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Initialize logging from configuration, with the CLI level taking precedence
fn init_logging_with_config(config: &LoadTestConfig, log_level: Option<&String>) -> Result<()> {
    let mut logging_config = config.logging.clone();
    if let Some(level_str) = log_level {
        match level_str.parse::<LogLevel>() {
            Ok(level) => logging_config.level = level,
            Err(_) => eprintln!("Invalid log level '{}', keeping '{}'", level_str, logging_config.level),
        }
    }

    fleetload_logging::init_logging_from_config(&logging_config)?;
    debug!("Structured logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Run {
            users,
            run_time,
            report,
        }) => {
            let mut config = load_config(cli.config.as_ref())?;
            init_logging_with_config(&config, cli.log_level.as_ref())?;
            commands::apply_run_overrides(&mut config, *users, run_time.as_deref(), report.as_ref())?;
            commands::run_command(config).await
        }
        Some(Commands::Helper { port, data_dir }) => {
            let config = load_config(cli.config.as_ref())?;
            init_logging_with_config(&config, cli.log_level.as_ref())?;
            info!("fleetload helper starting");
            commands::helper_command(config, *port, data_dir.as_ref()).await
        }
        Some(Commands::Config { config_cmd }) => {
            fleetload_logging::init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
            match config_cmd {
                ConfigCommands::Validate { config_file } => {
                    commands::config_validate_command(config_file)
                }
                ConfigCommands::Sample { output, force } => {
                    commands::config_sample_command(output.as_ref(), *force)
                }
            }
        }
        None => {
            warn!("No command specified");
            println!("No command specified. Use --help to see available commands.");
            Ok(())
        }
    }
}
