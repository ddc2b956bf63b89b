//! Generic retry strategy implementation
//!
//! A small retry executor for async operations. Callers decide per error
//! whether another attempt is worthwhile through a [`RetryPolicy`]; the
//! executor applies backoff and jitter between attempts and returns the final
//! error unchanged when it gives up.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("all {attempts} retry attempts exhausted: {source:?}")]
    Exhausted { attempts: u32, source: E },

    /// The operation failed with an error the policy refused to retry
    #[error("operation failed with non-retryable error: {source:?}")]
    NonRetryable { source: E },
}

impl<E> RetryError<E> {
    /// The error returned by the last attempt.
    #[must_use]
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide whether `error` from attempt `attempt` (0-based) is retried.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry with the configured backoff delay
    Retry,
    /// Give up and surface the error
    Stop,
}

/// Exponential backoff: `initial_delay * base^attempt`, capped at `max_delay`
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial_delay: Duration,
    pub base: f64,
    pub max_delay: Duration,
}

impl Backoff {
    /// Calculate the delay that follows the given 0-based attempt
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_millis() as f64 * self.base.powi(exponent);
        let capped = delay.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Equal jitter: half the calculated delay plus up to the other half
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    #[must_use]
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Equal => {
                let half = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX) / 2;
                Duration::from_millis(half + random_up_to(half))
            }
        }
    }
}

fn random_up_to(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max)
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay growth between attempts
    pub backoff: Backoff,
    /// Jitter type for randomizing delays
    pub jitter: Jitter,
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    #[must_use]
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute an operation with retry logic
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error, wrapped as `NonRetryable` when the
    /// policy stopped early or `Exhausted` when every attempt failed.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            debug!("Executing operation (attempt {}/{})", attempt + 1, max_attempts);

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if self.policy.should_retry(&error, attempt) == RetryDecision::Stop {
                debug!("Retry policy declined to retry: {:?}", error);
                return Err(RetryError::NonRetryable { source: error });
            }
            if attempt + 1 >= max_attempts {
                warn!("All {} retry attempts exhausted, last error: {:?}", max_attempts, error);
                return Err(RetryError::Exhausted { attempts: attempt + 1, source: error });
            }
            let delay = self.config.jitter.apply(self.config.backoff.calculate_delay(attempt));

            warn!("Operation failed (attempt {}), retrying after {:?}", attempt + 1, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
