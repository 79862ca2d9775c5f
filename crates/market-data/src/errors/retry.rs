use std::future::Future;
use std::time::Duration;

use log::debug;

use super::MarketDataError;

/// Classification for retry policy.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Try next provider? |
/// |-------|----------------------|--------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes, until attempts run out | Yes |
/// | `NextProvider` | No | Yes |
/// | `CircuitOpen` | No | Yes (skip this one) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal for the whole lookup.
    Never,

    /// Transient failure (rate limiting, timeout, connection reset).
    ///
    /// Retried against the same provider by [`retry_with_backoff`]; once
    /// attempts are exhausted the failure is recorded against the provider's
    /// circuit breaker and the chain moves on.
    WithBackoff,

    /// This provider can't answer, but another one might.
    NextProvider,

    /// Circuit breaker is open for this provider.
    CircuitOpen,
}

/// Delay schedule between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base * 2^(retry - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Retry policy shared by the HTTP provider adapters.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            2,
            Backoff::Exponential {
                base: Duration::from_millis(500),
                max: Duration::from_secs(4),
            },
        )
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts run out.
///
/// Only errors classified [`RetryClass::WithBackoff`] are retried. The last
/// error is returned unchanged so the caller's circuit breaker sees the real
/// cause.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    provider: &str,
    mut op: F,
) -> Result<T, MarketDataError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MarketDataError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.retry_class() == RetryClass::WithBackoff && attempt < policy.max_attempts => {
                let delay = policy.backoff.delay(attempt);
                debug!(
                    "{}: attempt {}/{} failed ({}), retrying in {:?}",
                    provider, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(2),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(500));
        assert_eq!(backoff.delay(2), Duration::from_secs(1));
        assert_eq!(backoff.delay(3), Duration::from_secs(2));
        assert_eq!(backoff.delay(10), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_millis(100)));

        let result = retry_with_backoff(&policy, "TEST", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(MarketDataError::RateLimited {
                        provider: "TEST".to_string(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Backoff::Fixed(Duration::from_millis(100)));

        let result: Result<(), _> = retry_with_backoff(&policy, "TEST", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(MarketDataError::Timeout {
                    provider: "TEST".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(MarketDataError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_non_transient_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = retry_with_backoff(&policy, "TEST", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MarketDataError::SymbolNotFound("XYZ".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(MarketDataError::SymbolNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
