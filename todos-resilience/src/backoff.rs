//! Backoff strategies for retry and reconnect policies

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,

    /// Linear increase: delay = step * attempt
    Linear,

    /// Multiply the previous delay by `factor` (2 for doubling)
    Exponential { factor: u32 },
}

/// Sequence of delays for one retry sequence
///
/// Each iterator owns its working delay, so a policy can hand out any number
/// of independent sequences. Every yielded delay is capped at `max_delay`,
/// including after jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: BackoffStrategy,
    step: Duration,
    max_delay: Duration,
    jitter: bool,
    attempt: u32,
    current: Duration,
}

impl Backoff {
    /// Create a new backoff sequence starting at `step`
    pub fn new(strategy: BackoffStrategy, step: Duration, max_delay: Duration) -> Self {
        Self {
            strategy,
            step,
            max_delay,
            jitter: false,
            attempt: 0,
            current: Duration::ZERO,
        }
    }

    /// Doubling backoff: `initial`, `2 * initial`, ... capped at `max_delay`
    pub fn exponential(initial: Duration, max_delay: Duration) -> Self {
        Self::new(BackoffStrategy::Exponential { factor: 2 }, initial, max_delay)
    }

    /// Linear backoff: `step`, `2 * step`, ... capped at `max_delay`
    pub fn linear(step: Duration, max_delay: Duration) -> Self {
        Self::new(BackoffStrategy::Linear, step, max_delay)
    }

    /// Apply +/-20% jitter to every delay
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Number of delays handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    fn advance(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);

        let base = match self.strategy {
            BackoffStrategy::Fixed => self.step,
            BackoffStrategy::Linear => self.step.saturating_mul(self.attempt),
            BackoffStrategy::Exponential { factor } => {
                if self.attempt == 1 {
                    self.step
                } else {
                    self.current.saturating_mul(factor)
                }
            }
        };

        self.current = base.min(self.max_delay);
        self.current
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();

        let jitter_factor = rng.gen_range(0.8..1.2);
        Duration::try_from_secs_f64(delay.as_secs_f64() * jitter_factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.advance();
        if self.jitter {
            Some(self.add_jitter(delay))
        } else {
            Some(delay)
        }
    }
}
