//! Page messages: offline content downloads.
//!
//! Every `DOWNLOAD_OFFLINE_CONTENT` request produces exactly one
//! `DOWNLOAD_COMPLETE` reply on the channel it arrived with.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::{CacheKind, RequestKey};
use crate::error::{Result, WorkerError};
use crate::models::{DownloadRequest, DownloadResult, WorkerMessage, WorkerReply};
use crate::network::{fetch_with_retry, WorkerRequest};
use crate::worker::Worker;

impl Worker {
    // == Message Event ==
    /// Handles one page message and produces its reply.
    pub async fn handle_message(&self, message: WorkerMessage) -> WorkerReply {
        match message {
            WorkerMessage::DownloadOfflineContent(request) => {
                WorkerReply::DownloadComplete(self.handle_download(&request).await)
            }
        }
    }

    /// Accepts a page message, processes it as tracked work and returns the
    /// channel its single reply arrives on.
    pub fn post_message(
        self: &Arc<Self>,
        message: WorkerMessage,
    ) -> (Uuid, oneshot::Receiver<WorkerReply>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let worker = Arc::clone(self);

        self.wait_until(async move {
            let reply = worker.handle_message(message).await;
            if tx.send(reply).is_err() {
                warn!("Message {} finished after its sender went away", id);
            }
        });
        (id, rx)
    }

    // == Download ==
    /// Downloads a resource into the offline-content cache and reports the
    /// outcome; never fails.
    pub async fn handle_download(&self, request: &DownloadRequest) -> DownloadResult {
        match self.download_offline_content(request).await {
            Ok(()) => {
                info!("Content downloaded for offline use: {}", request.content_id);
                DownloadResult::succeeded(&request.content_id)
            }
            Err(e) => {
                error!("Failed to download content {}: {}", request.content_id, e);
                DownloadResult::failed(&request.content_id, e.to_string())
            }
        }
    }

    async fn download_offline_content(&self, request: &DownloadRequest) -> Result<()> {
        if let Some(reason) = request.validate() {
            return Err(WorkerError::InvalidRequest(reason));
        }

        let url = self.resolve(&request.content_url)?;
        let upstream = WorkerRequest::get(url.clone());
        let response =
            fetch_with_retry(self.fetcher.as_ref(), &upstream, &self.config.retry_policy()).await?;

        if !response.is_ok() {
            return Err(WorkerError::UpstreamStatus(response.status.as_u16()));
        }

        self.cache_response(CacheKind::Offline, RequestKey::get(url), response)
            .await;
        Ok(())
    }
}
