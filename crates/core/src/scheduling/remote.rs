//! Guards around remote backend calls
//!
//! Every call gets a deadline. Reads additionally go through the retry
//! executor for transient failures; writes get exactly one attempt.

use std::future::Future;
use std::time::Duration;

use bookline_common::resilience::{
    Backoff, Jitter, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy,
};
use bookline_domain::{BackendKind, BooklineError, Result, RetrySettings};
use tracing::debug;

/// Deadline and retry budget applied to backend calls.
#[derive(Debug, Clone)]
pub struct RemoteCallPolicy {
    pub call_timeout: Duration,
    pub read_retry: RetryConfig,
}

impl RemoteCallPolicy {
    #[must_use]
    pub fn new(call_timeout: Duration, settings: &RetrySettings) -> Self {
        Self {
            call_timeout,
            read_retry: RetryConfig {
                max_attempts: settings.max_attempts.max(1),
                backoff: Backoff {
                    initial_delay: Duration::from_millis(settings.initial_delay_ms),
                    base: 2.0,
                    max_delay: Duration::from_secs(5),
                },
                jitter: Jitter::Equal,
            },
        }
    }

    /// One attempt bounded by the call timeout. Used for every remote write.
    ///
    /// # Errors
    /// Returns `RemoteUnavailable` when the call times out, otherwise the
    /// call's own error.
    pub async fn write<T, Fut>(&self, kind: BackendKind, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        with_deadline(self.call_timeout, kind, call).await
    }

    /// Timed attempts, retried while the error is transient.
    ///
    /// # Errors
    /// Returns the last attempt's error once retries are exhausted or the error
    /// is not transient.
    pub async fn read<T, F, Fut>(&self, kind: BackendKind, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.call_timeout;
        RetryExecutor::new(self.read_retry.clone(), TransientReads)
            .execute(|| with_deadline(timeout, kind, call()))
            .await
            .map_err(|err| err.into_inner())
    }
}

impl Default for RemoteCallPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), &RetrySettings::default())
    }
}

struct TransientReads;

impl RetryPolicy<BooklineError> for TransientReads {
    fn should_retry(&self, error: &BooklineError, attempt: u32) -> RetryDecision {
        if error.is_retryable_read() {
            debug!(attempt, error = %error, "retrying backend read");
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

async fn with_deadline<T, Fut>(timeout: Duration, kind: BackendKind, call: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BooklineError::RemoteUnavailable(format!(
            "{kind} did not respond within {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn policy(max_attempts: u32, timeout_ms: u64) -> RemoteCallPolicy {
        let mut policy = RemoteCallPolicy::new(
            Duration::from_millis(timeout_ms),
            &RetrySettings { max_attempts, initial_delay_ms: 1 },
        );
        policy.read_retry.jitter = Jitter::None;
        policy
    }

    #[tokio::test]
    async fn slow_call_becomes_remote_unavailable() {
        let result: Result<()> = policy(1, 10)
            .write(BackendKind::Ghl, async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(BooklineError::RemoteUnavailable(_))));
    }

    #[tokio::test]
    async fn reads_retry_transient_errors_only() {
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result: Result<u32> = policy(3, 1000)
            .read(BackendKind::Vagaro, || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(BooklineError::RateLimited("429".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 1);

        calls.store(0, Ordering::SeqCst);
        let counter = Arc::clone(&calls);
        let result: Result<u32> = policy(3, 1000)
            .read(BackendKind::Vagaro, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(BooklineError::Auth("401".into())) }
            })
            .await;
        assert!(matches!(result, Err(BooklineError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
