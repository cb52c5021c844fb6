use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use todos_cli::cli::{Cli, Commands, ConfigCommands};
use todos_cli::commands::{
    handle_config_sample, handle_config_validate, handle_simulate, load_config, SimulateOptions,
};
use todos_logging::{init_logging, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config sample` must print clean YAML, so it runs before logging is set up
    if let Some(Commands::Config {
        config_cmd: ConfigCommands::Sample,
    }) = &cli.command
    {
        return handle_config_sample();
    }

    let mut config = load_config(cli.config.as_deref())?;

    if let Some(ref level) = cli.log_level {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid --log-level")?;
    }
    init_logging(&config.logging)?;

    match cli.command {
        Some(Commands::Simulate {
            calls,
            failure_rate,
            dependency,
            interval_ms,
            timeout_ms,
        }) => {
            let options = SimulateOptions {
                calls,
                failure_rate,
                dependency,
                interval: Duration::from_millis(interval_ms),
                timeout: timeout_ms.map(Duration::from_millis),
            };
            handle_simulate(&config, options).await
        }
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Sample => handle_config_sample(),
            ConfigCommands::Validate { config_file } => handle_config_validate(&config_file),
        },
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}
