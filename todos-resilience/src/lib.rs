//! Resilience patterns for the todos service
//!
//! This crate provides the fault-tolerance layer that guards calls to
//! unreliable external dependencies: a circuit breaker, a bounded retry
//! executor with capped exponential backoff, a reconnect policy for
//! connection establishment, and the per-dependency composition of the two.

pub mod backoff;
pub mod circuit_breaker;
pub mod context;
pub mod dependency;
pub mod reconnect;
pub mod retry;

// Re-export commonly used types
pub use backoff::{Backoff, BackoffStrategy};
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerConfig, CircuitBreakerError,
    CircuitMetrics, CircuitSnapshot, CircuitState,
};
pub use context::{CallContext, CancelReason, CancellationToken};
pub use dependency::{Dependency, DependencyRegistry, ResilienceError, PUBLISHER, STORE};
pub use reconnect::{ReconnectError, ReconnectPolicy, Retryable};
pub use retry::{retry, LogObserver, RetryError, RetryExecutor, RetryObserver, RetryPolicy};
