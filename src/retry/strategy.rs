// src/retry/strategy.rs

use crate::config::RetryConfig;
use crate::transport::ProbeError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self::new(RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Execute a function with retry logic
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_counted(f, |_| RetryDecision::Retry).await.0
    }

    /// Execute with custom retry decision logic
    pub async fn execute_with_decision<F, Fut, T, E>(
        &self,
        f: F,
        should_retry: impl Fn(&E) -> RetryDecision,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_counted(f, should_retry).await.0
    }

    /// Like `execute_with_decision`, also returning how many attempts ran.
    pub async fn execute_counted<F, Fut, T, E>(
        &self,
        mut f: F,
        should_retry: impl Fn(&E) -> RetryDecision,
    ) -> (Result<T, E>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => return (Ok(result), attempt),
                Err(error) => {
                    if should_retry(&error) == RetryDecision::NoRetry {
                        debug!("Error is non-retryable: {}", error);
                        return (Err(error), attempt);
                    }

                    if attempt >= max_attempts {
                        if max_attempts > 1 {
                            warn!("Retry failed after {} attempts: {}", attempt, error);
                        }
                        return (Err(error), attempt);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    debug!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempt, error, backoff
                    );

                    sleep(backoff).await;
                }
            }
        }
    }

    /// Calculate exponential backoff with jitter
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base().as_millis() as u64;
        let max = self.config.backoff_max().as_millis() as u64;

        // Exponential backoff: base * 2^(attempt - 1)
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt - 1));

        let capped = exponential.min(max);

        // Add jitter (0-25% of the calculated backoff)
        let jitter = (capped as f64 * rand::random::<f64>() * 0.25) as u64;

        Duration::from_millis(capped + jitter)
    }

    /// Only transient probe failures get another attempt.
    pub fn probe_decision(error: &ProbeError) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry
        } else {
            RetryDecision::NoRetry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            backoff_base_ms: 10,
            backoff_max_ms: 100,
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let strategy = RetryStrategy::new(config(3));
        let counter = AtomicU32::new(0);

        let result = strategy
            .execute(|| async {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err("Temporary failure")
                } else {
                    Ok("Success")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "Success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_with_decision_stops_on_no_retry() {
        let strategy = RetryStrategy::new(config(5));
        let counter = AtomicU32::new(0);

        let result: Result<(), String> = strategy
            .execute_with_decision(
                || async {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    Err(if count == 0 { "busy".to_string() } else { "fatal".to_string() })
                },
                |e: &String| {
                    if e == "busy" {
                        RetryDecision::Retry
                    } else {
                        RetryDecision::NoRetry
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_max_attempts() {
        let strategy = RetryStrategy::new(config(2));

        let (result, attempts): (Result<(), &str>, u32) = strategy
            .execute_counted(|| async { Err("Always fails") }, |_| RetryDecision::Retry)
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_non_transient_probe_error_is_not_retried() {
        let strategy = RetryStrategy::new(config(5));
        let counter = AtomicU32::new(0);

        let (result, attempts) = strategy
            .execute_counted(
                || async {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ProbeError::HttpStatus(404))
                },
                RetryStrategy::probe_decision,
            )
            .await;

        assert_eq!(result.unwrap_err(), ProbeError::HttpStatus(404));
        assert_eq!(attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_probe_error_is_retried() {
        let strategy = RetryStrategy::new(config(3));

        let (result, attempts) = strategy
            .execute_counted(
                || async { Err::<(), _>(ProbeError::HttpStatus(503)) },
                RetryStrategy::probe_decision,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let strategy = RetryStrategy::new(config(10));
        for attempt in 1..10 {
            let backoff = strategy.calculate_backoff(attempt);
            assert!(backoff <= Duration::from_millis(125));
        }
    }
}
