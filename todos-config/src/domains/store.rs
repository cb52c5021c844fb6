//! Store connection configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_required_string, Validatable};

/// Key/value store and log channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,

    pub port: u16,

    /// Channel that todo create/delete events are published on
    pub log_channel: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            log_channel: "log_channel".to_string(),
        }
    }
}

impl StoreConfig {
    /// `host:port` address of the store
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Validatable for StoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.host, "host", self.domain_name())?;
        validate_port_range(self.port, "port", self.domain_name())?;
        validate_required_string(&self.log_channel, "log_channel", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "store"
    }
}
