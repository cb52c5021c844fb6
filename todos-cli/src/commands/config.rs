//! `todos config` subcommands

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::Path;

use todos_config::{ConfigLoader, TodosConfig};

/// Load configuration from `config_path`, or from the environment
pub fn load_config(config_path: Option<&Path>) -> Result<TodosConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) if path.exists() => {
            info!("Loading configuration from: {:?}", path);
            loader
                .from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))
        }
        Some(path) => {
            warn!("Configuration file not found: {:?}. Using defaults.", path);
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Print the default configuration as YAML
pub fn handle_config_sample() -> Result<()> {
    print!("{}", TodosConfig::generate_sample());
    Ok(())
}

/// Load and validate a configuration file
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match load_config(Some(config_file)) {
        Ok(config) => {
            println!("Configuration file is valid");
            for name in config.resilience.dependencies.keys() {
                let breaker = config.resilience.breaker_for(name);
                let retry = config.resilience.retry_for(name);
                println!(
                    "  {}: breaker threshold {} / reset {:?}, retry {} attempts ({:?}..{:?})",
                    name,
                    breaker.failure_threshold,
                    breaker.reset_timeout,
                    retry.max_attempts,
                    retry.initial_wait,
                    retry.max_wait
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}
