//! Worker Module
//!
//! The worker context and its event handlers: fetch interception, page
//! messages, background sync, push, and the install/activate lifecycle.
//!
//! One [`Worker`] exists per process and is shared as `Arc<Worker>` with
//! every handler. Event work that must outlive the triggering call is
//! spawned with [`Worker::wait_until`] so shutdown can wait for it.

mod download;
mod fetch;
mod lifecycle;
mod push;
mod sync;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheKind, CacheSnapshots, CacheStorage, RequestKey};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Result, WorkerError};
use crate::models::{CacheStatsEntry, StatsResponse};
use crate::network::{Fetcher, HttpFetcher, WorkerResponse};
use crate::queue::ProgressQueue;

pub use fetch::{not_found_response, offline_response, API_PREFIX};
pub use lifecycle::{Lifecycle, WorkerState, MAX_CLIENTS};
pub use push::{Notification, NotificationCenter, NotificationData};
pub use sync::{SyncOutcome, SYNC_TAG};

// == Worker ==
/// Explicit worker context owned by the process.
pub struct Worker {
    config: Config,
    /// Parsed upstream origin every intercepted path resolves against
    origin: Url,
    /// Shared with successor workers so activation can purge stale caches
    caches: Arc<RwLock<CacheStorage>>,
    /// On-disk copy of `caches`, written through on every change
    snapshots: CacheSnapshots,
    db: Database,
    queue: ProgressQueue,
    fetcher: Arc<dyn Fetcher>,
    lifecycle: RwLock<Lifecycle>,
    notifications: NotificationCenter,
    /// Last connectivity observation; starts optimistic
    online: AtomicBool,
    /// Keeps event work alive until it completes
    tasks: TaskTracker,
}

impl Worker {
    // == Constructors ==
    /// Creates a worker over `db`, restoring the caches stored in it.
    pub async fn new(config: Config, fetcher: Arc<dyn Fetcher>, db: Database) -> Result<Self> {
        let caches = db.snapshots().load().await?;
        if !caches.keys().is_empty() {
            info!("Restored caches: {}", caches.keys().join(","));
        }
        Self::with_storage(config, fetcher, db, Arc::new(RwLock::new(caches)))
    }

    /// Creates a worker over existing cache storage.
    pub fn with_storage(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        db: Database,
        caches: Arc<RwLock<CacheStorage>>,
    ) -> Result<Self> {
        let origin = Url::parse(&config.upstream_origin)?;
        Ok(Self {
            config,
            origin,
            caches,
            snapshots: db.snapshots(),
            queue: db.queue(),
            db,
            fetcher,
            lifecycle: RwLock::new(Lifecycle::new()),
            notifications: NotificationCenter::new(),
            online: AtomicBool::new(true),
            tasks: TaskTracker::new(),
        })
    }

    /// Creates a worker with the HTTP fetcher and the on-disk database.
    pub async fn from_config(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.request_timeout())?;
        let db = Database::open(&config.database_path).await?;
        info!("Database opened at {}", config.database_path);
        Self::new(config, Arc::new(fetcher), db).await
    }

    // == Accessors ==
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &ProgressQueue {
        &self.queue
    }

    pub fn caches(&self) -> &RwLock<CacheStorage> {
        &self.caches
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Resolves a path (or absolute URL) against the upstream origin.
    ///
    /// Absolute URLs and `//host` references leave the origin; use
    /// [`resolve_path`](Self::resolve_path) for paths taken from a request line.
    pub fn resolve(&self, target: &str) -> Result<String> {
        Ok(self.origin.join(target)?.to_string())
    }

    /// Places a request-line path and query on the upstream origin.
    ///
    /// The result always has the origin's scheme, host and port, whatever
    /// the path looks like.
    pub fn resolve_path(&self, path_and_query: &str) -> Result<String> {
        if !path_and_query.starts_with('/') {
            return Err(WorkerError::InvalidRequest(format!(
                "not an origin-relative path: {}",
                path_and_query
            )));
        }
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        Ok(url.to_string())
    }

    // == Connectivity ==
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records connectivity and returns the previous observation.
    pub fn set_online(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::SeqCst)
    }

    // == Wait Until ==
    /// Spawns event work tracked by the worker; shutdown waits for it.
    pub fn wait_until<F>(&self, work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tasks.spawn(work)
    }

    /// Stops accepting tracked work and waits for in-flight work to finish.
    pub async fn shutdown(&self) {
        self.tasks.close();
        debug!("Waiting for {} in-flight worker tasks", self.tasks.len());
        self.tasks.wait().await;
        info!("Worker tasks drained");
    }

    // == Cache Helpers ==
    /// Stores a response in one of the worker's caches and enforces its budget.
    async fn cache_response(&self, kind: CacheKind, key: RequestKey, response: WorkerResponse) -> bool {
        self.cache_responses(kind, vec![(key, response)]).await > 0
    }

    /// Stores responses in one cache, enforces its budget, and writes the
    /// changes through to the database. Returns how many were stored.
    ///
    /// The write lock is held until the database agrees with memory.
    /// Database failures are logged; the in-memory cache stays authoritative.
    async fn cache_responses(
        &self,
        kind: CacheKind,
        responses: Vec<(RequestKey, WorkerResponse)>,
    ) -> usize {
        let name = self.config.cache_name(kind);
        let budget = self.config.cache_budget_mb(kind);

        let mut caches = self.caches.write().await;
        let stored: Vec<RequestKey> = responses
            .into_iter()
            .filter_map(|(key, response)| caches.put(&name, key.clone(), response).then_some(key))
            .collect();
        if stored.is_empty() {
            return 0;
        }
        let evicted = caches.enforce_limit(&name, budget);

        if let Some(cache) = caches.get(&name) {
            for key in &stored {
                if let Some(entry) = cache.entry(key) {
                    if let Err(e) = self.snapshots.save(&name, key, entry).await {
                        warn!("Failed to persist {} in {}: {}", key, name, e);
                    }
                }
            }
        }
        if let Err(e) = self.snapshots.remove(&name, &evicted).await {
            warn!("Failed to drop evicted entries of {}: {}", name, e);
        }
        stored.len()
    }

    /// Looks a request up across all caches.
    async fn match_cached(&self, key: &RequestKey) -> Option<WorkerResponse> {
        self.caches.write().await.match_any(key)
    }

    /// True when this version's shell cache holds at least one entry.
    async fn has_stored_shell(&self) -> bool {
        let shell = self.config.cache_name(CacheKind::Shell);
        self.caches
            .read()
            .await
            .get(&shell)
            .is_some_and(|cache| !cache.is_empty())
    }

    // == Stats ==
    pub async fn stats(&self) -> StatsResponse {
        let caches = self
            .caches
            .read()
            .await
            .stats()
            .iter()
            .map(|(name, stats)| CacheStatsEntry::new(name.clone(), stats))
            .collect();
        let lifecycle = self.lifecycle.read().await;

        StatsResponse {
            state: lifecycle.state().to_string(),
            online: self.is_online(),
            queued: self.queue.len().await.unwrap_or(0),
            clients: lifecycle.client_count(),
            caches,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolve_against_origin() {
        let worker = worker_with(Arc::new(MockFetcher::online())).await;
        assert_eq!(worker.resolve("/").unwrap(), "http://upstream.test/");
        assert_eq!(
            worker.resolve("/api/courses?id=1").unwrap(),
            "http://upstream.test/api/courses?id=1"
        );
        assert_eq!(
            worker.resolve("http://cdn.test/video.mp4").unwrap(),
            "http://cdn.test/video.mp4"
        );
    }

    #[tokio::test]
    async fn test_invalid_origin_rejected() {
        let config = Config {
            upstream_origin: "not an origin".to_string(),
            ..Config::default()
        };
        let db = Database::open_in_memory().await.unwrap();
        let result = Worker::new(config, Arc::new(MockFetcher::online()), db).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_path_stays_on_origin() {
        let worker = worker_with(Arc::new(MockFetcher::online())).await;
        assert_eq!(
            worker.resolve_path("/api/courses?id=1").unwrap(),
            "http://upstream.test/api/courses?id=1"
        );
        assert_eq!(
            worker.resolve_path("//attacker.test/x").unwrap(),
            "http://upstream.test//attacker.test/x"
        );
        assert!(worker.resolve_path("http://attacker.test/x").is_err());
    }

    #[tokio::test]
    async fn test_set_online_returns_previous() {
        let worker = worker_with(Arc::new(MockFetcher::online())).await;
        assert!(worker.is_online());
        assert!(worker.set_online(false));
        assert!(!worker.set_online(true));
        assert!(worker.is_online());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_tracked_work() {
        let worker = worker_with(Arc::new(MockFetcher::online())).await;
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        worker.wait_until(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        worker.shutdown().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cache_response_enforces_budget() {
        let config = Config {
            api_cache_mb: 0,
            ..test_config()
        };
        let worker = worker_with_config(Arc::new(MockFetcher::online()), config).await;
        let response = WorkerResponse::new(axum::http::StatusCode::OK, "abc")
            .with_header(axum::http::header::CONTENT_LENGTH, "3");

        let stored = worker
            .cache_response(CacheKind::Api, RequestKey::get("http://upstream.test/api/a"), response)
            .await;
        assert!(stored);

        // A zero budget evicts the entry straight after it is stored.
        let caches = worker.caches().read().await;
        assert!(caches.get("nabha-v1-api").unwrap().is_empty());
        assert!(worker.snapshots.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_response_writes_through() {
        let worker = worker_with(Arc::new(MockFetcher::online())).await;
        let key = RequestKey::get("http://upstream.test/api/a");
        let response = WorkerResponse::new(axum::http::StatusCode::OK, "abc");
        assert!(worker.cache_response(CacheKind::Api, key.clone(), response).await);

        let mut restored = worker.snapshots.load().await.unwrap();
        assert_eq!(restored.match_any(&key).unwrap().body, "abc");
    }
}
