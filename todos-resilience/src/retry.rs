//! Retry policy and executor

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::context::{CallContext, CancelReason};

/// Retry policy configuration
///
/// A policy is immutable and can be shared by any number of concurrent
/// sequences; the working backoff delay lives in each sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Wait after the first failed attempt
    #[serde(with = "humantime_serde")]
    pub initial_wait: Duration,

    /// Upper bound for any wait between attempts
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,

    /// Whether to add +/-20% jitter to retry waits
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: Duration::from_millis(100),
            max_wait: Duration::from_millis(2000),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_wait: Duration, max_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_wait,
            max_wait,
            jitter: false,
        }
    }

    /// A policy that runs the operation exactly once
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Fresh backoff sequence for one retry run
    pub fn backoff(&self) -> Backoff {
        Backoff::exponential(self.initial_wait, self.max_wait).with_jitter(self.jitter)
    }
}

/// Hook notified of every failed attempt
///
/// Observers only watch; nothing they do can change the retry decision.
pub trait RetryObserver: Send + Sync {
    fn attempt_failed(&self, attempt: u32, max_attempts: u32, error: &dyn Display);
}

/// Default observer writing failed attempts to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl RetryObserver for LogObserver {
    fn attempt_failed(&self, attempt: u32, max_attempts: u32, error: &dyn Display) {
        warn!("Retry attempt {}/{} failed: {}", attempt, max_attempts, error);
    }
}

/// Retry executor
#[derive(Clone)]
pub struct RetryExecutor {
    policy: Arc<RetryPolicy>,
    observer: Arc<dyn RetryObserver>,
}

impl RetryExecutor {
    /// Create a new retry executor with the given policy
    pub fn new(mut policy: RetryPolicy) -> Self {
        policy.max_attempts = policy.max_attempts.max(1);
        Self {
            policy: Arc::new(policy),
            observer: Arc::new(LogObserver),
        }
    }

    /// Create with default policy
    pub fn with_default_policy() -> Self {
        Self::new(RetryPolicy::default())
    }

    /// Replace the failed-attempt observer
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a function with retry logic
    pub async fn execute<F, Fut, T, E>(&self, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_with_context(&CallContext::default(), |_attempt| f())
            .await
    }

    /// Execute with retry logic, passing the attempt number to `f`
    ///
    /// Backoff waits honour the cancellation token and deadline in `ctx`.
    pub async fn execute_with_context<F, Fut, T, E>(
        &self,
        ctx: &CallContext,
        mut f: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.policy.max_attempts;
        let mut backoff = self.policy.backoff();
        let mut attempt = 1;

        loop {
            debug!("Executing attempt {} of {}", attempt, max_attempts);

            match f(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    self.observer.attempt_failed(attempt, max_attempts, &error);

                    if attempt >= max_attempts {
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = backoff.next().unwrap_or(self.policy.max_wait);
                    debug!("Retrying in {:?}", delay);

                    if let Err(reason) = ctx.wait(delay).await {
                        warn!(
                            "Retry sequence stopped after {} attempts: {}",
                            attempt, reason
                        );
                        return Err(RetryError::Cancelled {
                            attempts: attempt,
                            reason,
                            last_error: error,
                        });
                    }

                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Run `operation` under `policy` with the default observer
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryExecutor::new(policy.clone()).execute(operation).await
}

/// Retry error types
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every permitted attempt failed; `last_error` is the final attempt's error
    #[error("Maximum retry attempts ({attempts}) exceeded. Last error: {last_error}")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },

    /// A backoff wait was cancelled or would have overrun the deadline
    #[error("Retry {reason} after {attempts} attempts. Last error: {last_error}")]
    Cancelled {
        attempts: u32,
        reason: CancelReason,
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Get the last operation error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::MaxAttemptsExceeded { last_error, .. } => last_error,
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }

    pub fn last_error(&self) -> &E {
        match self {
            RetryError::MaxAttemptsExceeded { last_error, .. } => last_error,
            RetryError::Cancelled { last_error, .. } => last_error,
        }
    }

    /// Number of attempts that ran
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::MaxAttemptsExceeded { attempts, .. } => *attempts,
            RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, Clone)]
    struct TestError {
        message: String,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    fn fails(message: impl Into<String>) -> TestError {
        TestError {
            message: message.into(),
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        failures: Mutex<Vec<(u32, u32, String)>>,
    }

    impl RetryObserver for RecordingObserver {
        fn attempt_failed(&self, attempt: u32, max_attempts: u32, error: &dyn Display) {
            self.failures
                .lock()
                .push((attempt, max_attempts, error.to_string()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let attempt_times = Arc::new(Mutex::new(Vec::new()));
        let executor = RetryExecutor::with_default_policy();

        let result = executor
            .execute(|| {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                attempt_times.lock().push(Instant::now());
                async move {
                    if count < 2 {
                        Err(fails("Temporary failure"))
                    } else {
                        Ok("Success".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "Success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        let times = attempt_times.lock();
        let first_wait = times[1] - times[0];
        let second_wait = times[2] - times[1];
        assert!(first_wait >= Duration::from_millis(100) && first_wait < Duration::from_millis(110));
        assert!(second_wait >= Duration::from_millis(200) && second_wait < Duration::from_millis(210));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_last_error() {
        let counter = AtomicU32::new(0);
        let executor = RetryExecutor::with_default_policy();

        let result: Result<(), RetryError<TestError>> = executor
            .execute(|| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(fails(format!("failure {}", attempt))) }
            })
            .await;

        let error = result.unwrap_err();
        assert!(matches!(error, RetryError::MaxAttemptsExceeded { attempts: 3, .. }));
        assert_eq!(error.into_inner().message, "failure 3");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_does_not_wait() {
        let executor = RetryExecutor::new(RetryPolicy::no_retry());
        let start = Instant::now();

        let result: Result<(), _> = executor.execute(|| async { Err(fails("once")) }).await;

        assert_eq!(result.unwrap_err().attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_runs_once() {
        let counter = AtomicU32::new(0);
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        });

        let result: Result<(), _> = executor
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(fails("nope")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_are_capped() {
        let policy = RetryPolicy::new(6, Duration::from_millis(100), Duration::from_millis(300));
        let executor = RetryExecutor::new(policy);
        let start = Instant::now();

        let result: Result<(), _> = executor.execute(|| async { Err(fails("down")) }).await;

        // 100 + 200 + 300 + 300 + 300
        assert!(result.is_err());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1200));
        assert!(elapsed < Duration::from_millis(1250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_every_failure() {
        let observer = Arc::new(RecordingObserver::default());
        let executor = RetryExecutor::with_default_policy().with_observer(observer.clone());
        let counter = AtomicU32::new(0);

        let result = executor
            .execute(|| {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count == 0 {
                        Err(fails("flaky"))
                    } else {
                        Ok(count)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(*observer.failures.lock(), vec![(1, 3, "flaky".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_with_context_passes_attempt() {
        let executor = RetryExecutor::with_default_policy();

        let result = executor
            .execute_with_context(&CallContext::new(), |attempt| async move {
                if attempt < 3 {
                    Err(fails(format!("Attempt {}", attempt)))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        let executor = RetryExecutor::new(RetryPolicy::new(
            5,
            Duration::from_secs(1),
            Duration::from_secs(10),
        ));
        let counter = AtomicU32::new(0);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            token.cancel();
        });

        let result: Result<(), _> = executor
            .execute_with_context(&ctx, |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(fails(format!("attempt {}", attempt))) }
            })
            .await;

        let error = result.unwrap_err();
        assert!(matches!(
            error,
            RetryError::Cancelled {
                attempts: 1,
                reason: CancelReason::Cancelled,
                ..
            }
        ));
        assert_eq!(error.last_error().message, "attempt 1");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_retries() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(250));
        let executor = RetryExecutor::with_default_policy();

        let result: Result<(), _> = executor
            .execute_with_context(&ctx, |_| async { Err(fails("slow")) })
            .await;

        // Attempt 2 starts at 100ms; the 200ms wait would end past the deadline
        assert!(matches!(
            result.unwrap_err(),
            RetryError::Cancelled {
                attempts: 2,
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_retry_function() {
        let result = retry(&RetryPolicy::default(), || async { Ok::<_, TestError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_policy_serde() {
        let policy: RetryPolicy =
            serde_yaml::from_str("max_attempts: 5\ninitial_wait: 50ms\nmax_wait: 1s\n").unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_wait, Duration::from_millis(50));
        assert_eq!(policy.max_wait, Duration::from_secs(1));
        assert!(!policy.jitter);
    }
}
