//! Retry with exponential backoff
//!
//! Generic retry helper for transient storage failures (timeouts, lost
//! connections). Reservation commits go through [`persist_with_retry`],
//! which bounds each attempt with a timeout and retries once.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::errors::{DomainError, InfraError};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
    /// Maximum delay between retries (cap).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(1),
        }
    }
}

/// Execute an async operation with exponential backoff retry.
///
/// The `should_retry` closure determines whether a given error is transient
/// (and therefore retryable) or permanent (bail immediately).
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Operation failed permanently"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );

                tokio::time::sleep(delay).await;

                // Exponential backoff with cap
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
                attempt += 1;
            }
        }
    }
}

/// Bound a storage call with `timeout`; expiry surfaces as a persistence error.
pub async fn with_timeout<T, Fut>(timeout: Duration, fut: Fut) -> Result<T, DomainError>
where
    Fut: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(InfraError::Timeout(timeout.as_millis() as u64).into()),
    }
}

/// Run a storage operation with a per-attempt timeout, retrying transient
/// failures according to `config`.
pub async fn persist_with_retry<F, Fut, T>(
    config: &RetryConfig,
    timeout: Duration,
    mut operation: F,
    operation_name: &str,
) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    retry_with_backoff(
        config,
        || with_timeout(timeout, operation()),
        DomainError::is_transient,
        operation_name,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<u32, DomainError> = persist_with_retry(
            &fast(),
            Duration::from_secs(1),
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(DomainError::Persistence("blip".into()))
                    } else {
                        Ok(7)
                    }
                }
            },
            "test",
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn business_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), DomainError> = persist_with_retry(
            &fast(),
            Duration::from_secs(1),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(DomainError::StaleWrite("changed".into()))
                }
            },
            "test",
        )
        .await;

        assert!(matches!(result, Err(DomainError::StaleWrite(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_surfaces_persistence_error_after_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), DomainError> = persist_with_retry(
            &fast(),
            Duration::from_millis(10),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            },
            "test",
        )
        .await;

        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
