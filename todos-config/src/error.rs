//! Configuration errors

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Invalid configuration document: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// An override variable is set but does not parse
    #[error("Invalid value for {var}: {message}")]
    EnvError { var: String, message: String },

    /// A domain section parsed but breaks one of its constraints
    #[error("Domain configuration error in {domain}: {message}")]
    DomainError { domain: String, message: String },
}

impl ConfigError {
    pub(crate) fn domain(domain: &str, message: impl Into<String>) -> Self {
        ConfigError::DomainError {
            domain: domain.to_string(),
            message: message.into(),
        }
    }
}
