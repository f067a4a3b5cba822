//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a load test against the configured API
    Run {
        /// Number of concurrent workers (overrides configuration)
        #[arg(long, value_name = "N")]
        users: Option<usize>,

        /// Run duration such as 30m or 1h (overrides configuration)
        #[arg(long, value_name = "DURATION")]
        run_time: Option<String>,

        /// Where to write the JSON report (overrides configuration)
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Start the coordination helper service
    Helper {
        /// Port to bind to (overrides configuration)
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,

        /// Directory for the id and config files (overrides configuration)
        #[arg(long, value_name = "PATH")]
        data_dir: Option<PathBuf>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Print a sample configuration with every default filled in
    Sample {
        /// Write to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
