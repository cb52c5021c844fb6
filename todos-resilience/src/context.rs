//! Cancellation and deadlines for pending retry waits

use std::time::Duration;
use tokio::time::{sleep, Instant};

pub use tokio_util::sync::CancellationToken;

/// Why a retry sequence stopped before exhausting its attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired
    Cancelled,
    /// The next attempt could not start before the deadline
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Per-call options consulted during backoff waits
///
/// The default context never cancels. Cancellation is only observed between
/// attempts; an operation that is already running is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort pending backoff waits when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Do not start attempts after `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now; a timeout past the clock's range sets none
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reason this context would stop a sequence right now, if any
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        if self.token.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Suspend the calling task for `delay`
    ///
    /// Fails immediately when the wait would end past the deadline, and as
    /// soon as the token fires while waiting.
    pub(crate) async fn wait(&self, delay: Duration) -> Result<(), CancelReason> {
        if let Some(reason) = self.cancel_reason() {
            return Err(reason);
        }
        if let Some(deadline) = self.deadline {
            match Instant::now().checked_add(delay) {
                Some(end) if end <= deadline => {}
                _ => return Err(CancelReason::DeadlineExceeded),
            }
        }

        match &self.token {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(CancelReason::Cancelled),
                    _ = sleep(delay) => Ok(()),
                }
            }
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }
}
