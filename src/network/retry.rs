//! Retry with exponential backoff for flaky links.

use std::time::Duration;

use tracing::warn;

use crate::error::Result;
use crate::network::{Fetcher, WorkerRequest, WorkerResponse};

/// How many times a transport failure is retried and how long to back off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Backoff before retry number `retry` (1-based): `base_delay * 2^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.min(16)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Fetches `request`, retrying transport failures with exponential backoff.
///
/// HTTP error statuses are responses, not failures, and are returned
/// without retrying.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    request: &WorkerRequest,
    policy: &RetryPolicy,
) -> Result<WorkerResponse> {
    let mut retry = 0;
    loop {
        match fetcher.fetch(request).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_network_failure() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                warn!(
                    "Fetch of {} failed ({}), retry {}/{} in {:?}",
                    request.url, err, retry, policy.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then answers with `status`.
    struct Flaky {
        failures: u32,
        status: StatusCode,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Fetcher for Flaky {
        async fn fetch(&self, _request: &WorkerRequest) -> Result<WorkerResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(WorkerError::Network("connection reset".to_string()))
            } else {
                Ok(WorkerResponse::new(self.status, "ok"))
            }
        }
    }

    fn flaky(failures: u32, status: StatusCode) -> Flaky {
        Flaky {
            failures,
            status,
            calls: AtomicU32::new(0),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let fetcher = flaky(2, StatusCode::OK);
        let request = WorkerRequest::get("http://localhost/lesson");

        let response = fetch_with_retry(&fetcher, &request, &fast_policy(3))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let fetcher = flaky(10, StatusCode::OK);
        let request = WorkerRequest::get("http://localhost/lesson");

        let result = fetch_with_retry(&fetcher, &request, &fast_policy(2)).await;
        assert!(matches!(result, Err(WorkerError::Network(_))));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let fetcher = flaky(0, StatusCode::NOT_FOUND);
        let request = WorkerRequest::get("http://localhost/missing");

        let response = fetch_with_retry(&fetcher, &request, &fast_policy(3))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_policy_makes_one_attempt() {
        let fetcher = flaky(1, StatusCode::OK);
        let request = WorkerRequest::get("http://localhost/lesson");

        let result = fetch_with_retry(&fetcher, &request, &RetryPolicy::none()).await;
        assert!(result.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
