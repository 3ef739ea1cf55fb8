//! Retry loop with exponential backoff and additive jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::ValidationError;

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed {
        delay: Duration,
    },
    /// `min(base * factor^attempt + U(0, jitter), max)`.
    Exponential {
        /// Delay before the first retry, before jitter.
        base: Duration,
        /// Multiplier applied for each subsequent retry.
        factor: f64,
        /// Upper bound on any single delay, jitter included.
        max: Duration,
        /// Upper bound of the uniformly random amount added to each delay.
        jitter: Duration,
    },
}

impl Default for Backoff {
    /// Vendor throttling policy: 4s initial, up to 5s of jitter, 32s cap.
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(4),
            factor: 2.0,
            max: Duration::from_secs(32),
            jitter: Duration::from_secs(5),
        }
    }
}

impl Backoff {
    /// Delay to wait after the given 0-based failed attempt.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let jitter_seconds = jitter.as_secs_f64() * fastrand::f64();
                let capped = (seconds + jitter_seconds).min(max.as_secs_f64());
                Duration::from_secs_f64(capped.max(0.0))
            }
        }
    }
}

/// Retry configuration for a single fallible operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Result<Self, ValidationError> {
        if max_attempts == 0 {
            return Err(ValidationError::ZeroRetryAttempts);
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed { delay },
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::fixed(Duration::ZERO, 1)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Runs `operation` until it succeeds, fails with an error rejected by
    /// `should_retry`, or the attempt budget is spent. The last error is
    /// returned on exhaustion. Attempts are strictly sequential.
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt + 1 < max_attempts && should_retry(&error) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
