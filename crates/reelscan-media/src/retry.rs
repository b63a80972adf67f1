//! Retry policy shared by the sampling engines.
//!
//! One policy covers the three recurring concerns of the engines: bounded
//! retry of a single external call, the backoff between attempts, and a
//! consecutive-failure breaker that aborts a sampling loop while keeping
//! the partial results gathered so far.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base * n` before the n-th retry.
    Linear(Duration),
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(base) => base.saturating_mul(attempt.max(1)),
        }
    }
}

/// Retry and breaker parameters for one stage.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Consecutive failed samples before the sampling loop aborts.
    pub breaker_threshold: u32,
    /// Operation name for logging.
    pub operation_name: &'static str,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Linear(Duration::from_millis(100)),
            max_delay: Duration::from_secs(2),
            breaker_threshold: 5,
            operation_name: "operation",
        }
    }
}

impl RetryPolicy {
    /// Create a new policy with the given operation name.
    pub fn new(operation_name: &'static str) -> Self {
        Self {
            operation_name,
            ..Default::default()
        }
    }

    /// Policy without delays, for tests and in-memory providers.
    pub fn immediate(operation_name: &'static str) -> Self {
        Self {
            backoff: Backoff::None,
            ..Self::new(operation_name)
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.breaker_threshold = threshold.max(1);
        self
    }

    /// Delay before retry number `attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt).min(self.max_delay)
    }

    /// A fresh breaker configured with this policy's threshold.
    pub fn breaker(&self) -> ConsecutiveFailureBreaker {
        ConsecutiveFailureBreaker::new(self.operation_name, self.breaker_threshold)
    }

    /// Execute an async operation, retrying transient failures.
    ///
    /// Non-transient errors (end of stream, cancellation, resource
    /// exhaustion) are returned immediately.
    pub async fn retry<F, Fut, T>(&self, operation: F) -> MediaResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = MediaResult<T>>,
    {
        let mut attempt = 1u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        operation = self.operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sleep for the backoff that follows `consecutive_failures` failed samples.
    pub async fn backoff_after(&self, consecutive_failures: u32) {
        let delay = self.delay_for_attempt(consecutive_failures);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Counter that opens after N consecutive unrecoverable failures.
#[derive(Debug, Clone)]
pub struct ConsecutiveFailureBreaker {
    name: &'static str,
    threshold: u32,
    consecutive_failures: u32,
    total_failures: u32,
}

impl ConsecutiveFailureBreaker {
    pub fn new(name: &'static str, threshold: u32) -> Self {
        Self {
            name,
            threshold: threshold.max(1),
            consecutive_failures: 0,
            total_failures: 0,
        }
    }

    /// Record a successful sample (resets the consecutive count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            debug!(
                operation = self.name,
                failures = self.consecutive_failures,
                "Recovered after consecutive failures"
            );
        }
        self.consecutive_failures = 0;
    }

    /// Record a failed sample.
    ///
    /// Returns `true` when the breaker has just opened or is already open.
    pub fn record_failure(&mut self, error: &MediaError) -> bool {
        self.consecutive_failures += 1;
        self.total_failures += 1;

        if self.consecutive_failures == self.threshold {
            warn!(
                operation = self.name,
                failures = self.consecutive_failures,
                error = %error,
                "Consecutive failure limit reached, aborting sampling loop"
            );
        } else {
            debug!(
                operation = self.name,
                failures = self.consecutive_failures,
                error = %error,
                "Sample failed"
            );
        }

        self.is_open()
    }

    pub fn is_open(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_failures(&self) -> u32 {
        self.total_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_backoff() {
        let backoff = Backoff::Linear(Duration::from_millis(100));
        let policy = RetryPolicy::new("test").with_backoff(backoff);

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new("test").with_backoff(Backoff::Linear(Duration::from_secs(1)));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(2));
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let mut breaker = ConsecutiveFailureBreaker::new("test", 3);
        let err = MediaError::frame_unavailable(0, "decode");

        assert!(!breaker.record_failure(&err));
        assert!(!breaker.record_failure(&err));
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);

        assert!(!breaker.record_failure(&err));
        assert!(!breaker.record_failure(&err));
        assert!(breaker.record_failure(&err));
        assert!(breaker.is_open());
        assert_eq!(breaker.total_failures(), 5);
    }

    #[tokio::test]
    async fn test_retry_immediate_success() {
        let policy = RetryPolicy::immediate("test");
        let calls = AtomicU32::new(0);

        let result = policy
            .retry(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, MediaError>(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_eventual_success() {
        let policy = RetryPolicy::new("test").with_max_attempts(3);
        let calls = AtomicU32::new(0);

        let result = policy
            .retry(|| {
                let count = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(MediaError::frame_unavailable(0, "transient"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy::immediate("test").with_max_attempts(2);
        let calls = AtomicU32::new(0);

        let result: MediaResult<()> = policy
            .retry(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MediaError::Timeout(10)) }
            })
            .await;

        assert!(matches!(result, Err(MediaError::Timeout(10))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let policy = RetryPolicy::immediate("test").with_max_attempts(5);
        let calls = AtomicU32::new(0);

        let result: MediaResult<()> = policy
            .retry(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MediaError::EndOfStream) }
            })
            .await;

        assert!(matches!(result, Err(MediaError::EndOfStream)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
