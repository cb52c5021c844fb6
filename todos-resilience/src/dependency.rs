//! Per-dependency composition of circuit breaker and retry executor
//!
//! Every external dependency owns one breaker and one retry executor. A
//! logical call is admitted by the breaker, then driven through a full retry
//! sequence, and the breaker records only the net outcome of that sequence:
//! transient failures absorbed by retry never count toward the threshold.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use crate::context::{CallContext, CancelReason};
use crate::retry::{RetryError, RetryExecutor, RetryObserver, RetryPolicy};

/// Name of the key/value store dependency
pub const STORE: &str = "store";

/// Name of the log publisher dependency
pub const PUBLISHER: &str = "publisher";

/// Errors returned by [`Dependency::call`]
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError<E> {
    /// The breaker refused admission; the operation was not invoked
    #[error("Circuit breaker for '{dependency}' is open")]
    CircuitOpen { dependency: String },

    /// Every retry attempt failed; `last_error` comes from the final attempt
    #[error("'{dependency}' failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        dependency: String,
        attempts: u32,
        last_error: E,
    },

    /// The retry sequence was cancelled during a backoff wait
    #[error("'{dependency}' call {reason} after {attempts} attempts: {last_error}")]
    Cancelled {
        dependency: String,
        attempts: u32,
        reason: CancelReason,
        last_error: E,
    },
}

impl<E> ResilienceError<E> {
    /// Get the last operation error, if the operation was invoked
    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::CircuitOpen { .. } => None,
            ResilienceError::RetryExhausted { last_error, .. } => Some(last_error),
            ResilienceError::Cancelled { last_error, .. } => Some(last_error),
        }
    }

    pub fn dependency(&self) -> &str {
        match self {
            ResilienceError::CircuitOpen { dependency } => dependency,
            ResilienceError::RetryExhausted { dependency, .. } => dependency,
            ResilienceError::Cancelled { dependency, .. } => dependency,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled { .. })
    }
}

/// A guarded external dependency
#[derive(Clone, Debug)]
pub struct Dependency {
    name: Arc<str>,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
}

impl Dependency {
    pub fn new(name: impl Into<String>, breaker: CircuitBreakerConfig, retry: RetryPolicy) -> Self {
        let name: String = name.into();
        Self {
            breaker: CircuitBreaker::new(name.clone(), breaker),
            retry: RetryExecutor::new(retry),
            name: Arc::from(name),
        }
    }

    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default(), RetryPolicy::default())
    }

    /// Replace the observer notified of failed attempts
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.retry = self.retry.with_observer(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Run `operation` with retries, behind this dependency's breaker
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.call_with(&CallContext::default(), operation).await
    }

    /// Like [`call`](Self::call), with cancellation and deadline from `ctx`
    ///
    /// A cancelled sequence settles as neither success nor failure. If it held
    /// a half-open trial, that trial is spent and the circuit reopens.
    pub async fn call_with<F, Fut, T, E>(
        &self,
        ctx: &CallContext,
        mut operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let permit = self
            .breaker
            .try_acquire()
            .ok_or_else(|| ResilienceError::CircuitOpen {
                dependency: self.name.to_string(),
            })?;

        match self.retry.execute_with_context(ctx, |_| operation()).await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(RetryError::MaxAttemptsExceeded {
                attempts,
                last_error,
            }) => {
                permit.record_failure();
                Err(ResilienceError::RetryExhausted {
                    dependency: self.name.to_string(),
                    attempts,
                    last_error,
                })
            }
            Err(RetryError::Cancelled {
                attempts,
                reason,
                last_error,
            }) => {
                drop(permit);
                Err(ResilienceError::Cancelled {
                    dependency: self.name.to_string(),
                    attempts,
                    reason,
                    last_error,
                })
            }
        }
    }
}

/// The set of guarded dependencies of one process
///
/// Built once at start-up; each entry has its own breaker, so an outage of
/// one dependency never trips another's circuit.
#[derive(Clone, Debug, Default)]
pub struct DependencyRegistry {
    dependencies: BTreeMap<String, Dependency>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dependency, replacing any previous one with the same name
    pub fn register(&mut self, dependency: Dependency) -> &mut Self {
        self.dependencies
            .insert(dependency.name().to_string(), dependency);
        self
    }

    pub fn with(mut self, dependency: Dependency) -> Self {
        self.register(dependency);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.get(name)
    }

    /// Get the named dependency, registering one with default settings if absent
    pub fn get_or_default(&mut self, name: &str) -> &Dependency {
        self.dependencies
            .entry(name.to_string())
            .or_insert_with(|| Dependency::with_defaults(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Breaker snapshot of every dependency, ordered by name
    pub fn snapshots(&self) -> Vec<(String, CircuitSnapshot)> {
        self.dependencies
            .iter()
            .map(|(name, dependency)| (name.clone(), dependency.breaker().snapshot()))
            .collect()
    }
}
