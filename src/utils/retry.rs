//! Retry utilities with exponential backoff for resilient API calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Upper bound for a single delay
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powf(f64::from(attempt.saturating_sub(1)));
        // NaN.min() yields the cap; negative products become zero
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}

/// Transport-level failures that are worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Connection refused, DNS failure, reset
    Network,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Classify a SourceError. Structured API errors and parse failures are permanent.
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::Timeout(_) => Some(TransientError::Timeout),
            _ => None,
        }
    }
}

/// Execute an async operation, retrying transient failures with exponential backoff
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                let Some(transient) = TransientError::from_source_error(&error) else {
                    return Err(error);
                };

                if attempts >= max_attempts {
                    tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
                    return Err(error);
                }

                let delay = config.delay_for(attempts);
                tracing::debug!(
                    "Transient error on attempt {}: {:?}, retrying in {:?}",
                    attempts,
                    transient,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(RetryConfig::default(), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(4), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    if *call_count.borrow() < 3 {
                        Err(SourceError::Network("connection reset".to_string()))
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), SourceError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(3), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(SourceError::Timeout("deadline".to_string()))
                }
            })
        }
        .await;

        assert!(matches!(result, Err(SourceError::Timeout(_))));
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_api_error_immediately() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, SourceError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(5), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(SourceError::Api {
                        status: 400,
                        message: "bad filter".to_string(),
                    })
                }
            })
        }
        .await;

        assert!(matches!(result, Err(SourceError::Api { status: 400, .. })));
        assert_eq!(*call_count.borrow(), 1);
    }

    #[test]
    fn test_transient_error_detection() {
        assert_eq!(
            TransientError::from_source_error(&SourceError::Network("refused".into())),
            Some(TransientError::Network)
        );
        assert_eq!(
            TransientError::from_source_error(&SourceError::Timeout("slow".into())),
            Some(TransientError::Timeout)
        );
        assert!(TransientError::from_source_error(&SourceError::Parse("json".into())).is_none());
        assert!(TransientError::from_source_error(&SourceError::NotFound("x".into())).is_none());
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(4), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_with_bad_multiplier_never_panics() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: -2.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(500));
        assert_eq!(config.delay_for(2), Duration::ZERO);

        let config = RetryConfig {
            backoff_multiplier: f64::NAN,
            ..config
        };
        assert_eq!(config.delay_for(2), Duration::from_secs(5));
    }
}
