//! Domain-specific configuration modules

pub mod logging;
pub mod resilience;
pub mod store;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main todos configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TodosConfig {
    /// Breaker, retry and reconnect settings per dependency
    #[serde(default)]
    pub resilience: resilience::ResilienceConfig,

    /// Store connection configuration
    #[serde(default)]
    pub store: store::StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl TodosConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.resilience.validate()?;
        self.store.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = TodosConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
