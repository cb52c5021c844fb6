//! Circuit breaker pattern implementation
//!
//! A breaker gates calls to one external dependency. While closed it passes
//! calls through and counts consecutive failures; once the threshold is
//! reached it opens and rejects calls without invoking them until the reset
//! timeout has elapsed. The first call after the timeout moves the breaker to
//! half-open, where a bounded number of trial calls decide whether it closes
//! again or reopens.
//!
//! All state lives behind a single mutex. Admission hands out a [`CallPermit`]
//! and the outcome is recorded through that permit, so the admission check and
//! the outcome recording of one call are tied together even though the lock is
//! not held while the operation runs.

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests are rejected immediately
    Open,
    /// Circuit is half-open, limited trial requests probe recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures while closed before the circuit opens
    pub failure_threshold: u32,

    /// Time the circuit stays open before a trial call is admitted
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,

    /// Number of trial calls admitted during one half-open episode
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(10_000),
            half_open_max_calls: 1,
        }
    }
}

/// Counters accumulated over the breaker's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitMetrics {
    /// Calls admitted and settled with an outcome
    pub total_calls: u64,
    /// Admitted calls that succeeded
    pub total_successes: u64,
    /// Admitted calls that failed
    pub total_failures: u64,
    /// Calls rejected without being invoked
    pub total_rejected: u64,
}

/// Point-in-time view of a breaker, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_calls: u32,
    pub half_open_in_flight: u32,
    pub last_failure_time: Option<Instant>,
    pub metrics: CircuitMetrics,
}

/// Errors returned by [`CircuitBreaker::execute`]
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Admission was refused; the operation was not invoked
    #[error("Circuit breaker '{name}' is open")]
    Open { name: String },

    /// The operation ran and failed
    #[error("{0}")]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    /// Get the operation error if the operation was invoked
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Open { .. } => None,
            CircuitBreakerError::Operation(error) => Some(error),
        }
    }

    /// Check if this represents a rejected admission
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }
}

/// Thread-safe circuit breaker implementation
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    half_open_calls: u32,
    half_open_in_flight: u32,
    // Bumped on every transition; permits from an earlier generation are stale.
    generation: u64,
    metrics: CircuitMetrics,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            half_open_calls: 0,
            half_open_in_flight: 0,
            generation: 0,
            metrics: CircuitMetrics::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitKind {
    Passthrough,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Abandoned,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named dependency
    ///
    /// Zero thresholds are raised to 1.
    pub fn new(name: impl Into<String>, mut config: CircuitBreakerConfig) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        config.half_open_max_calls = config.half_open_max_calls.max(1);

        Self {
            name: Arc::from(name.into()),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState::new())),
        }
    }

    /// Create with default configuration
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Name of the dependency this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state
    ///
    /// Observing the state never transitions the breaker; only admission
    /// moves an expired open circuit to half-open.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state.lock();
        CircuitSnapshot {
            state: state.state,
            failure_count: state.failure_count,
            half_open_calls: state.half_open_calls,
            half_open_in_flight: state.half_open_in_flight,
            last_failure_time: state.last_failure_time,
            metrics: state.metrics,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let generation = state.generation + 1;
        *state = CircuitBreakerState::new();
        state.generation = generation;
        info!("Circuit breaker '{}' reset to closed", self.name);
    }

    /// Run `operation` if the breaker admits it
    ///
    /// The operation is invoked at most once. Its error is returned unchanged
    /// inside [`CircuitBreakerError::Operation`]; a refused admission yields
    /// [`CircuitBreakerError::Open`] without invoking it.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire().ok_or_else(|| CircuitBreakerError::Open {
            name: self.name.to_string(),
        })?;

        match operation().await {
            Ok(value) => {
                permit.record_success();
                Ok(value)
            }
            Err(error) => {
                permit.record_failure();
                Err(CircuitBreakerError::Operation(error))
            }
        }
    }

    /// Admission check
    ///
    /// Returns `None` when the call must be rejected. A half-open admission
    /// reserves one trial slot until its permit is settled; dropping a trial
    /// permit unsettled reopens the circuit.
    pub fn try_acquire(&self) -> Option<CallPermit> {
        let mut state = self.state.lock();

        let kind = match state.state {
            CircuitState::Closed => PermitKind::Passthrough,
            CircuitState::Open => {
                let expired = state.last_failure_time.map_or(true, |failed_at| {
                    Instant::now().saturating_duration_since(failed_at) >= self.config.reset_timeout
                });
                if !expired {
                    state.metrics.total_rejected += 1;
                    debug!("Circuit breaker '{}' rejected call: circuit open", self.name);
                    return None;
                }
                self.transition(&mut state, CircuitState::HalfOpen);
                state.half_open_in_flight += 1;
                PermitKind::Trial
            }
            CircuitState::HalfOpen => {
                if state.half_open_calls + state.half_open_in_flight >= self.config.half_open_max_calls {
                    state.metrics.total_rejected += 1;
                    debug!(
                        "Circuit breaker '{}' rejected call: no half-open trial slots left",
                        self.name
                    );
                    return None;
                }
                state.half_open_in_flight += 1;
                PermitKind::Trial
            }
        };

        Some(CallPermit {
            breaker: self.clone(),
            generation: state.generation,
            kind,
            settled: false,
        })
    }

    fn settle(&self, generation: u64, kind: PermitKind, outcome: Outcome) {
        let mut state = self.state.lock();

        if state.generation != generation {
            debug!(
                "Circuit breaker '{}' ignored {:?} from a call admitted before the last transition",
                self.name, outcome
            );
            return;
        }

        if kind == PermitKind::Trial {
            state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
        }

        match outcome {
            Outcome::Abandoned => {
                // An unsettled trial still used its admission; probe again after a full timeout.
                if kind == PermitKind::Trial && state.state == CircuitState::HalfOpen {
                    debug!("Circuit breaker '{}' trial call abandoned", self.name);
                    state.last_failure_time = Some(Instant::now());
                    self.transition(&mut state, CircuitState::Open);
                }
            }
            Outcome::Success => {
                state.metrics.total_calls += 1;
                state.metrics.total_successes += 1;
                match state.state {
                    CircuitState::Closed => state.failure_count = 0,
                    CircuitState::HalfOpen => {
                        state.half_open_calls += 1;
                        if state.half_open_calls >= self.config.half_open_max_calls {
                            self.transition(&mut state, CircuitState::Closed);
                        }
                    }
                    CircuitState::Open => {}
                }
            }
            Outcome::Failure => {
                state.metrics.total_calls += 1;
                state.metrics.total_failures += 1;
                match state.state {
                    CircuitState::Closed => {
                        state.failure_count += 1;
                        if state.failure_count >= self.config.failure_threshold {
                            state.last_failure_time = Some(Instant::now());
                            self.transition(&mut state, CircuitState::Open);
                        }
                    }
                    CircuitState::HalfOpen => {
                        state.last_failure_time = Some(Instant::now());
                        self.transition(&mut state, CircuitState::Open);
                    }
                    CircuitState::Open => {}
                }
            }
        }
    }

    fn transition(&self, state: &mut CircuitBreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;
        state.generation += 1;

        match to {
            CircuitState::Open => {
                warn!(
                    "Circuit breaker '{}' opened ({} -> {}) after {} consecutive failures",
                    self.name, from, to, state.failure_count
                );
            }
            CircuitState::HalfOpen => {
                state.half_open_calls = 0;
                state.half_open_in_flight = 0;
                info!("Circuit breaker '{}' transitioned to half-open state", self.name);
            }
            CircuitState::Closed => {
                state.failure_count = 0;
                info!("Circuit breaker '{}' closed after successful recovery", self.name);
            }
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`]
///
/// Settle it with [`record_success`](CallPermit::record_success) or
/// [`record_failure`](CallPermit::record_failure). Dropping it unsettled
/// records no outcome, except that an abandoned half-open trial reopens the
/// circuit as a failed trial would.
#[must_use = "a permit records nothing unless it is settled"]
pub struct CallPermit {
    breaker: CircuitBreaker,
    generation: u64,
    kind: PermitKind,
    settled: bool,
}

impl CallPermit {
    /// Whether this permit is a half-open trial call
    pub fn is_trial(&self) -> bool {
        self.kind == PermitKind::Trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.settle(self.generation, self.kind, Outcome::Success);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.settle(self.generation, self.kind, Outcome::Failure);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.generation, self.kind, Outcome::Abandoned);
        }
    }
}

/// Builder for circuit breakers
pub struct CircuitBreakerBuilder {
    name: String,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerBuilder {
    /// Create a new builder with default config
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig::default(),
        }
    }

    /// Set failure threshold
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set how long the circuit stays open before probing
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    /// Set the number of trial calls per half-open episode
    pub fn half_open_max_calls(mut self, calls: u32) -> Self {
        self.config.half_open_max_calls = calls;
        self
    }

    /// Build the circuit breaker
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(self.name, self.config)
    }
}
