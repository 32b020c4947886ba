//! Bounded retry for transient automation failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use restock_protocols::AdapterError;

/// Retry configuration for DOM-timing failures.
///
/// Only transient errors are retried. Structural failures (missing
/// elements, changed layouts) surface immediately: repeating the same
/// scrape against the same DOM cannot fix those.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all; every failure surfaces on the first attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the retry following `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay =
            self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(self.max_delay.as_millis() as f64) as u64)
    }

    /// Run `operation`, retrying transient failures with backoff.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        "{what} failed transiently (attempt {}/{}): {e}; retrying in {delay:?}",
                        attempt + 1,
                        self.max_retries + 1
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            max_retries: 2,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            max_retries: 5,
        };
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let calls = AtomicU32::new(0);
        let result = quick()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, AdapterError>(7) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let result = quick()
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AdapterError::Timeout("slow render".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_structural_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = quick()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AdapterError::LayoutChanged("no card grid".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(AdapterError::LayoutChanged(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = quick()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AdapterError::Timeout("still slow".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(AdapterError::Timeout(_))));
        // initial attempt plus max_retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_none_policy_never_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::none()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AdapterError::Timeout("slow".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
