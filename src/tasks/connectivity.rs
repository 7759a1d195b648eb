//! Connectivity Monitor Task
//!
//! Background task that stands in for the browser's online/offline events:
//! it checks the upstream origin and registers a progress sync whenever the
//! origin becomes reachable again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::network::{with_timeout, WorkerRequest};
use crate::worker::{Worker, SYNC_TAG};

/// Checks the upstream origin once and records the result.
///
/// Any HTTP response counts as online; a transport failure or timeout
/// counts as offline. On an offline → online transition a `sync-progress`
/// event is dispatched.
///
/// Returns the observed connectivity.
pub async fn check_connectivity(worker: &Arc<Worker>) -> bool {
    let online = match worker.resolve("/") {
        Ok(url) => {
            let request = WorkerRequest::get(url);
            let check = with_timeout(worker.config().static_timeout(), worker.fetcher().fetch(&request));
            match check.await {
                Ok(_) => true,
                Err(e) => {
                    debug!("Connectivity check failed: {}", e);
                    false
                }
            }
        }
        Err(e) => {
            warn!("Connectivity check has no target: {}", e);
            false
        }
    };

    let was_online = worker.set_online(online);
    match (was_online, online) {
        (false, true) => {
            info!("Connectivity restored, registering {}", SYNC_TAG);
            worker.dispatch_sync(SYNC_TAG);
        }
        (true, false) => info!("Connectivity lost"),
        _ => {}
    }
    online
}

/// Spawns a background task that periodically checks connectivity.
///
/// # Arguments
/// * `worker` - Shared worker whose connectivity flag is updated
/// * `interval_secs` - Interval in seconds between checks
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_connectivity_monitor(worker: Arc<Worker>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting connectivity monitor with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;
            check_connectivity(&worker).await;
        }
    })
}
