//! Reconnect policy for establishing connections to a dependency
//!
//! Connection establishment is retried separately from per-call execution:
//! a linear backoff with its own attempt limit and total time budget, and
//! errors that are classified as fatal stop immediately. This policy has no
//! link to any circuit breaker.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::backoff::Backoff;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether another connection attempt may succeed
    fn is_retryable(&self) -> bool;
}

/// Reconnect policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Maximum connection attempts
    pub max_attempts: u32,

    /// Delay increment per attempt
    #[serde(with = "humantime_serde")]
    pub step: Duration,

    /// Upper bound for a single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Total time budget across all attempts
    #[serde(with = "humantime_serde")]
    pub max_total: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            step: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            max_total: Duration::from_secs(60 * 60),
        }
    }
}

/// Reconnect error types
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError<E> {
    /// The connector reported an error that retrying cannot fix
    #[error("Connection failed permanently after {attempts} attempts: {last_error}")]
    Fatal { attempts: u32, last_error: E },

    #[error("Connection failed after {attempts} attempts. Last error: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: E },

    #[error("Connection retry budget of {budget:?} exhausted. Last error: {last_error}")]
    BudgetExhausted { budget: Duration, last_error: E },
}

impl<E> ReconnectError<E> {
    pub fn into_inner(self) -> E {
        match self {
            ReconnectError::Fatal { last_error, .. } => last_error,
            ReconnectError::AttemptsExhausted { last_error, .. } => last_error,
            ReconnectError::BudgetExhausted { last_error, .. } => last_error,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self) -> Backoff {
        Backoff::linear(self.step, self.max_delay)
    }

    /// Establish a connection with `connect`, retrying per this policy
    pub async fn connect<F, Fut, C, E>(&self, mut connect: F) -> Result<C, ReconnectError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<C, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let started = Instant::now();
        let mut backoff = self.backoff();
        let mut attempt = 1;

        loop {
            match connect(attempt).await {
                Ok(connection) => {
                    if attempt > 1 {
                        info!("Connected after {} attempts", attempt);
                    }
                    return Ok(connection);
                }
                Err(error) if !error.is_retryable() => {
                    warn!("Connection attempt {} failed permanently: {}", attempt, error);
                    return Err(ReconnectError::Fatal {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    if attempt >= max_attempts {
                        return Err(ReconnectError::AttemptsExhausted {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = backoff.next().unwrap_or(self.max_delay);
                    let over_budget = started
                        .elapsed()
                        .checked_add(delay)
                        .map_or(true, |total| total > self.max_total);
                    if over_budget {
                        return Err(ReconnectError::BudgetExhausted {
                            budget: self.max_total,
                            last_error: error,
                        });
                    }

                    warn!(
                        "Connection attempt {}/{} failed: {}. Reconnecting in {:?}",
                        attempt, max_attempts, error, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum ConnectError {
        Refused,
        Timeout,
    }

    impl Display for ConnectError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ConnectError::Refused => write!(f, "connection refused"),
                ConnectError::Timeout => write!(f, "connection timed out"),
            }
        }
    }

    impl Retryable for ConnectError {
        fn is_retryable(&self) -> bool {
            !matches!(self, ConnectError::Refused)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_after_transient_failures() {
        let policy = ReconnectPolicy::default();
        let start = Instant::now();

        let connection = policy
            .connect(|attempt| async move {
                if attempt < 4 {
                    Err(ConnectError::Timeout)
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(connection, 4);
        // 100 + 200 + 300
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(600));
        assert!(elapsed < Duration::from_millis(620));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_is_fatal() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = ReconnectPolicy::default()
            .connect(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ConnectError::Refused) }
            })
            .await;

        assert!(matches!(result, Err(ReconnectError::Fatal { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_limit() {
        let result: Result<(), _> = ReconnectPolicy::default()
            .connect(|_| async { Err(ConnectError::Timeout) })
            .await;

        match result {
            Err(ReconnectError::AttemptsExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 10);
                assert_eq!(last_error, ConnectError::Timeout);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_budget() {
        let policy = ReconnectPolicy {
            max_total: Duration::from_millis(250),
            ..ReconnectPolicy::default()
        };

        let result: Result<(), _> = policy.connect(|_| async { Err(ConnectError::Timeout) }).await;

        // 100ms then 200ms would overrun the 250ms budget
        assert!(matches!(result, Err(ReconnectError::BudgetExhausted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_delay_exhausts_budget() {
        let policy = ReconnectPolicy {
            step: Duration::MAX,
            max_delay: Duration::MAX,
            max_total: Duration::MAX,
            ..ReconnectPolicy::default()
        };
        let start = Instant::now();

        let result: Result<(), _> = policy
            .connect(|_| async {
                sleep(Duration::from_millis(1)).await;
                Err(ConnectError::Timeout)
            })
            .await;

        assert!(matches!(result, Err(ReconnectError::BudgetExhausted { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
