//! Background sync: uploads queued progress once connectivity returns.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::models::ProgressSyncRequest;
use crate::network::WorkerRequest;
use crate::worker::Worker;

/// The only sync tag the worker acts on.
pub const SYNC_TAG: &str = "sync-progress";

/// What a sync event ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Tag not handled by the worker
    Ignored,
    /// Queue was empty; no request made
    NothingQueued,
    /// Server accepted this many records and they were removed from the queue
    Synced(usize),
    /// Server answered with a non-success status; records kept
    Rejected(u16),
    /// Transport or storage failure; records kept unless the upload landed
    Failed(String),
}

impl Worker {
    // == Sync Event ==
    /// Runs a sync event. Failures are logged and reported in the outcome,
    /// never raised.
    pub async fn handle_sync(&self, tag: &str) -> SyncOutcome {
        if tag != SYNC_TAG {
            debug!("Ignoring sync event with tag {}", tag);
            return SyncOutcome::Ignored;
        }

        match self.sync_progress().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Progress sync failed: {}", e);
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Runs a sync event as tracked work so shutdown waits for it.
    pub fn dispatch_sync(self: &Arc<Self>, tag: impl Into<String>) -> JoinHandle<SyncOutcome> {
        let worker = Arc::clone(self);
        let tag = tag.into();
        self.wait_until(async move { worker.handle_sync(&tag).await })
    }

    async fn sync_progress(&self) -> Result<SyncOutcome> {
        let progress = self.queue.read_all().await;
        if progress.is_empty() {
            debug!("No queued progress to sync");
            return Ok(SyncOutcome::NothingQueued);
        }

        let count = progress.len();
        let url = self.resolve(&self.config.sync_path)?;
        let request = WorkerRequest::post_json(url, &ProgressSyncRequest { progress: &progress })?;
        let response = self.fetcher.fetch(&request).await?;

        if !response.is_ok() {
            warn!(
                "Progress sync rejected with status {}, keeping {} records",
                response.status, count
            );
            return Ok(SyncOutcome::Rejected(response.status.as_u16()));
        }

        // Only the records that were sent; anything queued meanwhile waits.
        if !self.queue.acknowledge(&progress).await {
            return Ok(SyncOutcome::Failed(
                "uploaded progress could not be removed".to_string(),
            ));
        }

        info!("Progress data synced successfully ({} records)", count);
        Ok(SyncOutcome::Synced(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::network::{Fetcher, WorkerResponse};
    use crate::queue::{ProgressQueue, ProgressRecord};
    use crate::worker::testing::*;
    use async_trait::async_trait;
    use axum::http::{header, Method, StatusCode};
    use serde_json::json;

    /// Accepts the upload, but a new record lands in the queue while it is in flight.
    struct LateAppendFetcher {
        queue: std::sync::Mutex<Option<ProgressQueue>>,
    }

    #[async_trait]
    impl Fetcher for LateAppendFetcher {
        async fn fetch(&self, _request: &WorkerRequest) -> Result<WorkerResponse> {
            let queue = self.queue.lock().unwrap().clone();
            if let Some(queue) = queue {
                let late = ProgressRecord::from_value("z-late", json!({"score": 9}));
                queue.append(late).await?;
            }
            Ok(WorkerResponse::new(StatusCode::OK, ""))
        }
    }

    async fn queue_three(worker: &Worker) {
        for (id, score) in [("a", 1), ("b", 2), ("c", 3)] {
            let record = ProgressRecord::from_value(id, json!({"lessonId": id, "score": score}));
            worker.queue().append(record).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_sync_success_clears_queue() {
        let fetcher = Arc::new(MockFetcher::online());
        let worker = worker_with(fetcher.clone()).await;
        queue_three(&worker).await;

        let outcome = worker.handle_sync(SYNC_TAG).await;
        assert_eq!(outcome, SyncOutcome::Synced(3));
        assert_eq!(worker.queue().len().await.unwrap(), 0);

        let calls = fetcher.calls();
        assert_eq!(calls.len(), 1);
        let upload = &calls[0];
        assert_eq!(upload.method, Method::POST);
        assert_eq!(upload.url, "http://upstream.test/api/progress/sync");
        assert_eq!(
            upload.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body: serde_json::Value = serde_json::from_slice(&upload.body).unwrap();
        let progress = body["progress"].as_array().unwrap();
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0]["id"], "a");
        assert_eq!(progress[0]["score"], 1);
    }

    #[tokio::test]
    async fn test_sync_keeps_records_queued_during_upload() {
        let fetcher = Arc::new(LateAppendFetcher {
            queue: std::sync::Mutex::new(None),
        });
        let db = Database::open_in_memory().await.unwrap();
        let worker = Worker::new(test_config(), fetcher.clone(), db).await.unwrap();
        queue_three(&worker).await;
        *fetcher.queue.lock().unwrap() = Some(worker.queue().clone());

        assert_eq!(worker.handle_sync(SYNC_TAG).await, SyncOutcome::Synced(3));
        let remaining = worker.queue().read_all().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "z-late");
    }

    #[tokio::test]
    async fn test_sync_rejected_keeps_records() {
        let fetcher = Arc::new(MockFetcher::new(MockReply::Status(
            StatusCode::INTERNAL_SERVER_ERROR,
            String::new(),
        )));
        let worker = worker_with(fetcher).await;
        queue_three(&worker).await;

        let outcome = worker.handle_sync(SYNC_TAG).await;
        assert_eq!(outcome, SyncOutcome::Rejected(500));
        assert_eq!(worker.queue().len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sync_network_failure_keeps_records() {
        let fetcher = Arc::new(MockFetcher::offline());
        let worker = worker_with(fetcher.clone()).await;
        queue_three(&worker).await;

        let outcome = worker.handle_sync(SYNC_TAG).await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert_eq!(worker.queue().len().await.unwrap(), 3);
        // Sync does not retry on its own.
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_unknown_tag_ignored() {
        let fetcher = Arc::new(MockFetcher::online());
        let worker = worker_with(fetcher.clone()).await;
        queue_three(&worker).await;

        assert_eq!(worker.handle_sync("sync-other").await, SyncOutcome::Ignored);
        assert!(fetcher.calls().is_empty());
        assert_eq!(worker.queue().len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sync_empty_queue_makes_no_request() {
        let fetcher = Arc::new(MockFetcher::online());
        let worker = worker_with(fetcher.clone()).await;

        assert_eq!(worker.handle_sync(SYNC_TAG).await, SyncOutcome::NothingQueued);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_sync_is_tracked() {
        let worker = worker_with(Arc::new(MockFetcher::online())).await;
        queue_three(&worker).await;

        let handle = worker.dispatch_sync(SYNC_TAG);
        worker.shutdown().await;
        assert_eq!(worker.queue().len().await.unwrap(), 0);
        assert_eq!(handle.await.unwrap(), SyncOutcome::Synced(3));
    }
}
