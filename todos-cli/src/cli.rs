//! CLI argument parsing definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use todos_resilience::{PUBLISHER, STORE};

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
    /// Drive a flaky dependency through the breaker and retry layer
    Simulate {
        /// Number of logical calls to make
        #[arg(long, value_name = "N", default_value_t = 20)]
        calls: u32,

        /// Share of backend calls that fail, between 0.0 and 1.0
        #[arg(long, value_name = "P", default_value_t = 0.5)]
        failure_rate: f64,

        /// Dependency to exercise
        #[arg(long, value_enum, default_value_t = DependencyKind::Store)]
        dependency: DependencyKind,

        /// Pause between logical calls
        #[arg(long, value_name = "MS", default_value_t = 250)]
        interval_ms: u64,

        /// Deadline for each logical call, including its retry waits
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a sample configuration with every default
    Sample,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(value_name = "PATH")]
        config_file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DependencyKind {
    Store,
    Publisher,
}

impl DependencyKind {
    /// Registry name of the dependency
    pub fn name(&self) -> &'static str {
        match self {
            DependencyKind::Store => STORE,
            DependencyKind::Publisher => PUBLISHER,
        }
    }
}
