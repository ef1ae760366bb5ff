use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::future::Future;
use std::time::Duration;

/// Fixed-bound, fixed-delay retry for transient synthesis failures.
///
/// Only [retryable](ErrorKind::is_retryable) errors are retried; anything
/// else (a rejected text, an exhausted quota) is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}
impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// No retries, no waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the attempt
    /// budget runs out. Exhaustion is reported as [`ErrorKind::Exhausted`]
    /// with the last failure attached.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(label, attempt, "Synthesis succeeded after retry");
                    }
                    return Ok(value);
                },
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    tracing::error!(label, attempt, error = %*err, "Synthesis retries exhausted");
                    return Err(err).or_raise(|| ErrorKind::Exhausted(attempt));
                },
                Err(err) => {
                    tracing::warn!(label, attempt, max_attempts, error = %*err, "Transient synthesis failure, retrying");
                    tokio::time::sleep(self.delay).await;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing(kind: ErrorKind, times: u32, calls: &AtomicU32) -> Result<&'static str> {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= times { Err(exn::Exn::from(kind)) } else { Ok("audio") }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_transient_failures() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result = policy.run("apple", || async move { failing(ErrorKind::Unavailable(429), 2, calls) }).await;
        assert_eq!(result.unwrap(), "audio");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        let err = policy.run("apple", || async move { failing(ErrorKind::Network, 10, calls) }).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Exhausted(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two waits between three attempts.
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failures_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let err = RetryPolicy::default()
            .run("apple", || async move { failing(ErrorKind::QuotaExceeded(402), 10, calls) })
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
