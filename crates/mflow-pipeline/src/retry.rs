//! Retry with bounded exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts (not counting the initial attempt)
    pub max_retries: u32,
    /// Base delay, doubled each attempt
    pub base_delay: Duration,
    /// Cap on the delay between attempts
    pub max_delay: Duration,
    /// Operation name for logging
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Execute an async operation, retrying with backoff while `retryable`
/// holds for the error. Non-retryable errors return immediately.
pub async fn retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if retryable(&e) && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::new("test").with_max_retries(5);

        let result: Result<u32, String> = retry_if(
            &config,
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_return_immediately() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::new("test").with_max_retries(5);

        let result: Result<(), String> = retry_if(
            &config,
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("permanent".to_string())
            },
            |_| false,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            ..RetryConfig::new("test")
        };

        let result: Result<(), String> = retry_if(
            &config,
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("still failing".to_string())
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap_err(), "still failing");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            operation_name: "test".to_string(),
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(30), Duration::from_secs(5));
    }
}
