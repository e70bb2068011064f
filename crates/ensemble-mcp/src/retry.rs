//! Retry logic with exponential backoff
//!
//! Connection attempts and requests against MCP servers go through a
//! configurable retry policy: transient failures back off exponentially,
//! non-retryable errors surface immediately.

use crate::error::McpError;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, McpError>;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_secs(0),
            max_backoff: Duration::from_secs(0),
            backoff_multiplier: 1.0,
        }
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }

    /// Calculate backoff duration for a given attempt
    fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let backoff = Duration::from_millis(backoff_ms as u64);

        backoff.min(self.max_backoff)
    }

    /// Check if an error is retryable
    fn is_retryable(error: &McpError) -> bool {
        matches!(
            error,
            McpError::ConnectionFailed(_) | McpError::RequestFailed(_) | McpError::NotConnected
        )
    }

    /// Execute an async operation with retry logic
    ///
    /// # Arguments
    ///
    /// * `operation_name` - Name of the operation (for logging)
    /// * `operation` - Async operation to execute
    ///
    /// # Returns
    ///
    /// Result of the operation, or the last error if all attempts fail
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt + 1,
                self.max_attempts,
                operation_name
            );

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !Self::is_retryable(&e) {
                        debug!(
                            "Operation '{}' failed with non-retryable error",
                            operation_name
                        );
                        return Err(e);
                    }

                    last_error = Some(e);

                    if attempt + 1 < self.max_attempts {
                        let backoff = self.backoff_duration(attempt + 1);
                        warn!(
                            "Operation '{}' failed (attempt {}/{}): {:?}. Retrying in {:?}",
                            operation_name,
                            attempt + 1,
                            self.max_attempts,
                            last_error,
                            backoff
                        );
                        sleep(backoff).await;
                    }
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| McpError::InternalError("Retry failed with no error".to_string()));

        warn!(
            "Operation '{}' failed after {} attempts: {:?}",
            operation_name, self.max_attempts, error
        );

        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_duration(0), Duration::from_secs(0));
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        assert!(policy.backoff_duration(10) <= Duration::from_secs(5));
    }

    #[test]
    fn test_is_retryable() {
        assert!(RetryPolicy::is_retryable(&McpError::ConnectionFailed(
            "x".to_string()
        )));
        assert!(RetryPolicy::is_retryable(&McpError::RequestFailed(
            "x".to_string()
        )));
        assert!(RetryPolicy::is_retryable(&McpError::NotConnected));

        assert!(!RetryPolicy::is_retryable(&McpError::ConfigError(
            "x".to_string()
        )));
        assert!(!RetryPolicy::is_retryable(&McpError::ToolCallFailed(
            "x".to_string()
        )));
    }

    #[tokio::test]
    async fn test_execute_success_first_try() {
        let policy = RetryPolicy::fast();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = policy
            .execute("test_op", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<i32, McpError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_success_after_retry() {
        let policy = RetryPolicy::fast();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = policy
            .execute("test_op", || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 2 {
                        Err(McpError::ConnectionFailed("transient".to_string()))
                    } else {
                        Ok::<i32, McpError>(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_all_attempts_fail() {
        let policy = RetryPolicy::fast();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = policy
            .execute("test_op", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, McpError>(McpError::ConnectionFailed("down".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_non_retryable_error() {
        let policy = RetryPolicy::fast();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = policy
            .execute("test_op", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, McpError>(McpError::ConfigError("bad".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1); // no retry
    }
}
