//! Per-domain validation

use std::fmt::Display;

use crate::error::{ConfigError, ConfigResult};

/// A configuration section that can check its own constraints
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Section name used in error messages
    fn domain_name(&self) -> &'static str;

    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::domain(self.domain_name(), message)
    }
}

pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::domain(
            domain,
            format!("{} cannot be empty", field_name),
        ));
    }
    Ok(())
}

/// Reject zero (and, for signed types, negative) values
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + Display,
{
    if value > T::default() {
        return Ok(());
    }
    Err(ConfigError::domain(
        domain,
        format!("{} must be greater than 0, got {}", field_name, value),
    ))
}

pub fn validate_port_range(port: u16, field_name: &str, domain: &str) -> ConfigResult<()> {
    match port {
        0 => Err(ConfigError::domain(
            domain,
            format!("{} cannot be 0", field_name),
        )),
        1..=1023 => {
            log::warn!("{} {} is a privileged port", field_name, port);
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1u32, "threshold", "resilience").is_ok());

        let err = validate_positive(0u32, "threshold", "resilience").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Domain configuration error in resilience: threshold must be greater than 0, got 0"
        );
    }

    #[test]
    fn test_validate_required_string() {
        assert!(validate_required_string("redis", "host", "store").is_ok());
        assert!(validate_required_string("  ", "host", "store").is_err());
    }

    #[test]
    fn test_validate_port_range() {
        assert!(validate_port_range(6379, "port", "store").is_ok());
        assert!(validate_port_range(80, "port", "store").is_ok());
        assert!(validate_port_range(0, "port", "store").is_err());
    }
}
