//! Retry policy for generative service calls.
//!
//! Retries happen inside one claim cycle, while the row is held. They are
//! separate from the cross-cycle "release and let anyone retry" path, which
//! has no cap (see DESIGN.md, open questions).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::ServiceError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// delay = base_delay * attempt
    Linear,

    /// delay = base_delay * multiplier^(attempt - 1)
    Exponential { multiplier: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total calls allowed, including the first one.
    pub max_attempts: u32,

    /// Base delay for the first retry.
    pub base_delay: Duration,

    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// 3 attempts, 1s then 2s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff: Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    ///
    /// Example with base_delay=2s:
    /// - Linear: 2s, 4s, 6s
    /// - Exponential(2.0): 2s, 4s, 8s
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential { multiplier } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let delay_secs = self.base_delay.as_secs_f64() * multiplier.powi(exponent);
                if delay_secs.is_nan() || delay_secs < 0.0 {
                    return self.base_delay;
                }
                Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
            }
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` calls have been made.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.next_delay(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "generative call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn linear_backoff_grows_with_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));

        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(6));
    }

    #[test]
    fn exponential_backoff_increases() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2))
            .with_backoff(Backoff::Exponential { multiplier: 2.0 });

        assert_eq!(policy.next_delay(1), Duration::from_secs(2));
        assert_eq!(policy.next_delay(2), Duration::from_secs(4));
        assert_eq!(policy.next_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn degenerate_multipliers_do_not_panic() {
        let base = Duration::from_secs(2);
        let exponential =
            |multiplier| RetryPolicy::new(3, base).with_backoff(Backoff::Exponential { multiplier });

        assert_eq!(exponential(-1.0).next_delay(2), base);
        assert_eq!(exponential(f64::NAN).next_delay(2), base);
        assert_eq!(exponential(f64::MAX).next_delay(3), Duration::MAX);
        assert_eq!(exponential(2.0).next_delay(u32::MAX), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_errors_stop_at_attempt_cap() {
        let policy = RetryPolicy::default();
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = policy
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::rate_limited("429"))
            })
            .await;

        assert_eq!(result.unwrap_err().kind, ServiceErrorKind::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = &AtomicU32::new(0);

        let result: Result<(), _> = policy
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::other("400 bad request"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let policy = RetryPolicy::default();
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = policy
            .call(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(ServiceError::unavailable("503"))
                } else {
                    Ok("text")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "text");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
