//! Bounded condition polling.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::BrowserError;

/// Polls `probe` until it yields a value or `timeout` elapses.
///
/// `what` names the awaited condition in the timeout error. The probe runs
/// immediately, then every `interval`.
pub async fn poll<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, BrowserError>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if start.elapsed() > timeout {
            return Err(BrowserError::Timeout(what.to_string()));
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_poll_returns_on_first_success() {
        let result = poll(
            "instant condition",
            Duration::from_secs(1),
            Duration::from_millis(1),
            || async { Ok(Some(42)) },
        )
        .await
        .unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_poll_retries_until_ready() {
        let calls = AtomicU32::new(0);
        let result = poll(
            "third try",
            Duration::from_secs(1),
            Duration::from_millis(1),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok((n >= 2).then_some("ready")) }
            },
        )
        .await
        .unwrap();
        assert_eq!(result, "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let result: Result<(), _> = poll(
            "never ready",
            Duration::from_millis(10),
            Duration::from_millis(1),
            || async { Ok(None) },
        )
        .await;
        match result {
            Err(BrowserError::Timeout(what)) => assert_eq!(what, "never ready"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_propagates_probe_error() {
        let result: Result<(), _> = poll(
            "failing probe",
            Duration::from_secs(1),
            Duration::from_millis(1),
            || async { Err(BrowserError::JavaScript("boom".to_string())) },
        )
        .await;
        assert!(matches!(result, Err(BrowserError::JavaScript(_))));
    }
}
