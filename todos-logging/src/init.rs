use anyhow::Result;
use todos_config::domains::logging::{LogFormat, LogLevel};
use todos_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Filter for `directives`, falling back to `RUST_LOG` and then `info`
///
/// A configured [`LogLevel`] always parses, so only free-form directives
/// passed to [`init_simple_tracing`] can reach the fallbacks.
pub fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
///
/// A subscriber that is already installed is left in place.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_filter(config.level.as_str());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = build_filter(log_level);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
