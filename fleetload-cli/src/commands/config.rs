use anyhow::{Context, Result};
use fleetload_config::{ConfigLoader, LoadTestConfig};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

/// Handle configuration validation
pub fn config_validate_command(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(_) => {
            println!("Configuration file is valid");
            Ok(())
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            Err(e).context("Configuration validation failed")
        }
    }
}

/// Write or print a sample configuration
pub fn config_sample_command(output: Option<&PathBuf>, force: bool) -> Result<()> {
    let sample = LoadTestConfig::generate_sample();

    let Some(output) = output else {
        print!("{}", sample);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, sample).context("Failed to write configuration file")?;

    println!("Sample configuration written to {:?}", output);
    println!(
        "Validate with: fleetload config validate --config-file {:?}",
        output
    );
    Ok(())
}
