//! Retry with capped exponential backoff
//!
//! Only errors whose kind is retryable (`TransientNetwork`, `StoreUnavailable`)
//! are retried; everything else propagates on the first failure. Backoff
//! sleeps are cancellable.

use std::future::Future;
use std::time::Duration;

use mpat_protocol::Classify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::metrics::PipelineMetrics;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on any backoff delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Retry budget of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each subsequent one
    pub base_delay: Duration,
    /// Cap on a single delay, never above [`MAX_RETRY_DELAY`]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap; values above [`MAX_RETRY_DELAY`] are clamped
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay.min(MAX_RETRY_DELAY);
        self
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.max_delay.min(MAX_RETRY_DELAY);
        self.base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(cap)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent
    ///
    /// `operation` receives the attempt number, starting at 0. Cancellation
    /// aborts both the running attempt and any backoff sleep.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        metrics: &PipelineMetrics,
        target: &str,
        mut operation: F,
    ) -> Result<T, TaskError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(TaskError::cancelled());
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::cancelled()),
                result = operation(attempt) => result,
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(task = target, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            metrics.record_retry();
            warn!(
                task = target,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                kind = %err.kind,
                error = %err.message,
                "retrying after transient failure"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use mpat_protocol::ErrorKind;

    use super::*;

    fn transient() -> TaskError {
        TaskError::new(ErrorKind::TransientNetwork, "t", "connection reset")
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(1));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), MAX_RETRY_DELAY);
        assert_eq!(policy.delay_for(40), MAX_RETRY_DELAY);

        let policy = policy.with_max_delay(Duration::from_secs(60));
        assert_eq!(policy.max_delay, MAX_RETRY_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let metrics = PipelineMetrics::new();
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::default()
            .run(&CancellationToken::new(), &metrics, "t", |_| async {
                if calls.fetch_add(1, Ordering::Relaxed) < 2 {
                    Err(transient())
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.snapshot().retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let metrics = PipelineMetrics::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .with_max_retries(2)
            .run(&CancellationToken::new(), &metrics, "t", |_| async {
                calls.fetch_add(1, Ordering::Relaxed);
                Err(transient())
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::TransientNetwork);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let metrics = PipelineMetrics::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run(&CancellationToken::new(), &metrics, "t", |_| async {
                calls.fetch_add(1, Ordering::Relaxed);
                Err(TaskError::new(ErrorKind::Parse, "t", "syntax error"))
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Parse);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.snapshot().retries, 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let metrics = PipelineMetrics::new();
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(3600));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = tokio::time::timeout(
            Duration::from_secs(2),
            policy.run(&cancel, &metrics, "t", |_| async { Err(transient()) }),
        )
        .await
        .expect("retry loop did not observe cancellation");
        assert!(result.unwrap_err().is_cancelled());
    }
}
