//! Resilience configuration: breaker and retry settings per dependency

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use todos_resilience::{
    CircuitBreakerConfig, Dependency, DependencyRegistry, ReconnectPolicy, RetryPolicy, PUBLISHER,
    STORE,
};

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Resilience configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Breaker settings for dependencies without their own
    pub default_breaker: CircuitBreakerConfig,

    /// Retry settings for dependencies without their own
    pub default_retry: RetryPolicy,

    /// Connection establishment policy
    pub reconnect: ReconnectPolicy,

    /// Dependencies to guard, keyed by name
    pub dependencies: BTreeMap<String, DependencyConfig>,
}

/// Per-dependency overrides
///
/// An override replaces the whole default section; fields left out of it
/// take the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaker: Option<CircuitBreakerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        let dependencies = [STORE, PUBLISHER]
            .into_iter()
            .map(|name| (name.to_string(), DependencyConfig::default()))
            .collect();

        Self {
            default_breaker: CircuitBreakerConfig::default(),
            default_retry: RetryPolicy::default(),
            reconnect: ReconnectPolicy::default(),
            dependencies,
        }
    }
}

impl ResilienceConfig {
    /// Effective breaker settings for `name`
    pub fn breaker_for(&self, name: &str) -> CircuitBreakerConfig {
        self.dependencies
            .get(name)
            .and_then(|dependency| dependency.breaker.clone())
            .unwrap_or_else(|| self.default_breaker.clone())
    }

    /// Effective retry settings for `name`
    pub fn retry_for(&self, name: &str) -> RetryPolicy {
        self.dependencies
            .get(name)
            .and_then(|dependency| dependency.retry.clone())
            .unwrap_or_else(|| self.default_retry.clone())
    }

    /// Build one guarded [`Dependency`] per configured name
    pub fn build_registry(&self) -> DependencyRegistry {
        let mut registry = DependencyRegistry::new();
        for name in self.dependencies.keys() {
            registry.register(Dependency::new(
                name.clone(),
                self.breaker_for(name),
                self.retry_for(name),
            ));
        }
        registry
    }

    fn validate_breaker(&self, scope: &str, breaker: &CircuitBreakerConfig) -> ConfigResult<()> {
        validate_positive(
            breaker.failure_threshold,
            &format!("{}.failure_threshold", scope),
            self.domain_name(),
        )?;
        validate_positive(
            breaker.half_open_max_calls,
            &format!("{}.half_open_max_calls", scope),
            self.domain_name(),
        )?;
        if breaker.reset_timeout == Duration::ZERO {
            return Err(self.validation_error(format!("{}.reset_timeout must be non-zero", scope)));
        }
        Ok(())
    }

    fn validate_retry(&self, scope: &str, retry: &RetryPolicy) -> ConfigResult<()> {
        validate_positive(
            retry.max_attempts,
            &format!("{}.max_attempts", scope),
            self.domain_name(),
        )?;
        if retry.max_wait < retry.initial_wait {
            return Err(self.validation_error(format!(
                "{}.max_wait ({:?}) must not be less than initial_wait ({:?})",
                scope, retry.max_wait, retry.initial_wait
            )));
        }
        Ok(())
    }
}

impl Validatable for ResilienceConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.validate_breaker("default_breaker", &self.default_breaker)?;
        self.validate_retry("default_retry", &self.default_retry)?;

        validate_positive(
            self.reconnect.max_attempts,
            "reconnect.max_attempts",
            self.domain_name(),
        )?;
        if self.reconnect.max_delay < self.reconnect.step {
            return Err(self.validation_error("reconnect.max_delay must not be less than step"));
        }

        for (name, dependency) in &self.dependencies {
            if name.trim().is_empty() {
                return Err(self.validation_error("dependency names cannot be empty"));
            }
            if let Some(ref breaker) = dependency.breaker {
                self.validate_breaker(&format!("dependencies.{}.breaker", name), breaker)?;
            }
            if let Some(ref retry) = dependency.retry {
                self.validate_retry(&format!("dependencies.{}.retry", name), retry)?;
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "resilience"
    }
}
