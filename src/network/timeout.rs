//! Timer race for upstream operations.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, WorkerError};

/// Races `operation` against a timer of length `limit`.
///
/// Whichever settles first decides the outcome. When the timer wins the
/// operation future is dropped, which cancels the in-flight request and
/// releases its connection.
pub async fn with_timeout<F, T>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(WorkerError::Timeout(limit.as_millis() as u64)),
    }
}
