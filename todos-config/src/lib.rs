//! Domain-driven configuration management for the todos service
//!
//! Configuration is split by functional domain, with validation, defaults,
//! and environment variable support.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    logging::LoggingConfig, resilience::DependencyConfig, resilience::ResilienceConfig,
    store::StoreConfig, TodosConfig,
};
