//! Store error types

use thiserror::Error;
use todos_resilience::{ResilienceError, Retryable};

/// Result type for store and publisher operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store and publisher errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend refused the connection outright
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// The backend is temporarily unreachable or failed the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The dependency's circuit breaker rejected the call
    #[error("Circuit breaker for '{0}' is open")]
    CircuitOpen(String),

    /// The call was abandoned during a retry wait
    #[error("Call to '{dependency}' {reason}")]
    Cancelled { dependency: String, reason: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into())
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<ResilienceError<StoreError>> for StoreError {
    fn from(err: ResilienceError<StoreError>) -> Self {
        match err {
            ResilienceError::CircuitOpen { dependency } => StoreError::CircuitOpen(dependency),
            ResilienceError::RetryExhausted { last_error, .. } => last_error,
            ResilienceError::Cancelled {
                dependency, reason, ..
            } => StoreError::Cancelled {
                dependency,
                reason: reason.to_string(),
            },
        }
    }
}
