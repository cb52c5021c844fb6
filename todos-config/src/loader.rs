//! Configuration loading and environment variable handling

use crate::domains::TodosConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "TODOS".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TodosConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml(&content)
    }

    /// Load configuration from a YAML document with environment overrides
    pub fn from_yaml(&self, content: &str) -> ConfigResult<TodosConfig> {
        let mut config: TodosConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<TodosConfig> {
        let mut config = TodosConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load from `config_path` when given, otherwise from the environment
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TodosConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut TodosConfig) -> ConfigResult<()> {
        self.apply_resilience_overrides(&mut config.resilience)?;
        self.apply_store_overrides(&mut config.store)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Overrides target the default sections shared by every dependency
    fn apply_resilience_overrides(
        &self,
        config: &mut crate::domains::resilience::ResilienceConfig,
    ) -> ConfigResult<()> {
        if let Some(threshold) = self.parse_env::<u32>("BREAKER_FAILURE_THRESHOLD")? {
            config.default_breaker.failure_threshold = threshold;
        }
        if let Some(millis) = self.parse_env::<u64>("BREAKER_RESET_TIMEOUT_MS")? {
            config.default_breaker.reset_timeout = Duration::from_millis(millis);
        }
        if let Some(attempts) = self.parse_env::<u32>("RETRY_MAX_ATTEMPTS")? {
            config.default_retry.max_attempts = attempts;
        }
        if let Some(millis) = self.parse_env::<u64>("RETRY_INITIAL_WAIT_MS")? {
            config.default_retry.initial_wait = Duration::from_millis(millis);
        }
        if let Some(millis) = self.parse_env::<u64>("RETRY_MAX_WAIT_MS")? {
            config.default_retry.max_wait = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn apply_store_overrides(
        &self,
        config: &mut crate::domains::store::StoreConfig,
    ) -> ConfigResult<()> {
        if let Ok(host) = self.get_env_var("STORE_HOST") {
            config.host = host;
        }
        if let Some(port) = self.parse_env::<u16>("STORE_PORT")? {
            config.port = port;
        }
        if let Ok(channel) = self.get_env_var("LOG_CHANNEL") {
            config.log_channel = channel;
        }
        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Some(level) = self.parse_env("LOG_LEVEL")? {
            config.level = level;
        }
        if let Some(format) = self.parse_env("LOG_FORMAT")? {
            config.format = format;
        }
        Ok(())
    }

    fn parse_env<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Ok(value) = self.get_env_var(key) else {
            return Ok(None);
        };
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::EnvError {
                var: self.var_name(key),
                message: e.to_string(),
            })
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key)
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, key: &str) -> Result<String, std::env::VarError> {
        std::env::var(self.var_name(key))
    }
}
