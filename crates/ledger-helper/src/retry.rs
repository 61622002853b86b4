//! Retry of whole transactions on transient failures.
//!
//! [`with_retry`] re-runs an attempt while it fails with an error for which
//! [`HelperError::is_transient`] holds (commit conflicts, throttling,
//! transport failures, expired sessions). Not-found, validation and other
//! upstream failures are returned immediately.
//!
//! # Backoff Strategy
//!
//! - Base delay doubles with each attempt: `initial_backoff * 2^attempt`
//! - Delay is capped at `max_backoff`
//! - Random jitter of 0–50% of the computed delay is added

use std::{future::Future, time::Duration};

use fail::fail_point;
use rand::Rng;

use crate::{config::RetryConfig, error::Result};

/// Executes `operation` with retry on transient errors.
///
/// Returns the first success, or the error of the last attempt.
#[tracing::instrument(skip(config, operation), fields(max_retries = config.max_retries))]
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "operation succeeded after retry",
                    );
                }
                return Ok(value);
            },
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = compute_backoff(config, attempt);
                tracing::debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, retrying after backoff",
                );
                fail_point!("transaction-retry-before-sleep", |_| {
                    Err(crate::error::HelperError::upstream(
                        "transactionRetry",
                        crate::error::ServiceErrorKind::Internal,
                        "injected failure before retry backoff",
                    ))
                });
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(err) => {
                if attempt > 0 && err.is_transient() {
                    tracing::warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %err,
                        "retries exhausted",
                    );
                }
                return Err(err);
            },
        }
    }
}

/// Computes the backoff duration for the given attempt number.
///
/// `min(initial_backoff * 2^attempt, max_backoff) + random(0..50% of delay)`
pub(crate) fn compute_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.initial_backoff.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = base.min(config.max_backoff);

    let jitter_range = capped.as_millis() as u64 / 2;
    if jitter_range > 0 {
        let jitter = rand::rng().random_range(0..=jitter_range);
        capped + Duration::from_millis(jitter)
    } else {
        capped
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::{HelperError, ServiceErrorKind};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_retries(max_retries)
            .initial_backoff(Duration::from_millis(1))
            .max_backoff(Duration::from_millis(4))
            .build()
            .unwrap()
    }

    fn conflict() -> HelperError {
        HelperError::upstream("commitTransaction", ServiceErrorKind::Conflict, "occ conflict")
    }

    #[test]
    fn test_compute_backoff_exponential() {
        let config = RetryConfig::builder()
            .max_retries(5)
            .initial_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_secs(10))
            .build()
            .unwrap();

        let d0 = compute_backoff(&config, 0);
        assert!(d0 >= Duration::from_millis(100) && d0 <= Duration::from_millis(150));

        let d1 = compute_backoff(&config, 1);
        assert!(d1 >= Duration::from_millis(200) && d1 <= Duration::from_millis(300));

        let d2 = compute_backoff(&config, 2);
        assert!(d2 >= Duration::from_millis(400) && d2 <= Duration::from_millis(600));
    }

    #[test]
    fn test_compute_backoff_capped_at_max() {
        let config = RetryConfig::builder()
            .max_retries(10)
            .initial_backoff(Duration::from_secs(1))
            .max_backoff(Duration::from_secs(5))
            .build()
            .unwrap();

        let d = compute_backoff(&config, 40);
        assert!(d >= Duration::from_secs(5));
        assert!(d <= Duration::from_millis(7500));
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&fast_config(3), "op", || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Ok::<_, HelperError>(7) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&fast_config(3), "op", || {
            let attempt = calls.fetch_add(1, Ordering::Relaxed);
            async move { if attempt < 2 { Err(conflict()) } else { Ok(42) } }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&fast_config(2), "op", || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err(conflict()) }
        })
        .await;

        assert_eq!(result.unwrap_err().service_kind(), Some(ServiceErrorKind::Conflict));
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&fast_config(5), "op", || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err(HelperError::not_found("getDocumentById", "missing")) }
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&fast_config(0), "op", || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err(conflict()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
