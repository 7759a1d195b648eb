//! Worker lifecycle: install, activate, client claiming, supersession.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::{CacheKind, RequestKey};
use crate::config::Config;
use crate::error::{Result, WorkerError};
use crate::network::{WorkerRequest, WorkerResponse};
use crate::worker::Worker;

// == Worker State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Precaching the shell manifest
    Installing,
    /// Installed, not yet controlling pages
    Waiting,
    /// Controlling pages and serving fetches
    Active,
    /// Install failed or superseded by a newer version
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Waiting => write!(f, "waiting"),
            WorkerState::Active => write!(f, "active"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Most page sessions remembered at once; the oldest is forgotten first.
pub const MAX_CLIENTS: usize = 256;

// == Lifecycle ==
/// Lifecycle state plus the page sessions seen by the worker.
#[derive(Debug)]
pub struct Lifecycle {
    state: WorkerState,
    /// Page session -> cache version controlling it, if any
    clients: HashMap<String, Option<String>>,
    /// Session ids, oldest first
    order: VecDeque<String>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: WorkerState::Installing,
            clients: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn ensure(&self, expected: WorkerState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WorkerError::InvalidState(format!(
                "expected {}, worker is {}",
                expected, self.state
            )))
        }
    }

    /// Records a page session, controlled by `controller` if given.
    ///
    /// A known `id` is updated in place. Without an id a fresh one is
    /// generated. Past [`MAX_CLIENTS`] sessions the oldest is dropped.
    pub fn register_client(&mut self, id: Option<String>, controller: Option<String>) -> String {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.clients.insert(id.clone(), controller).is_some() {
            return id;
        }

        self.order.push_back(id.clone());
        while self.order.len() > MAX_CLIENTS {
            if let Some(oldest) = self.order.pop_front() {
                debug!("Forgetting page session {}", oldest);
                self.clients.remove(&oldest);
            }
        }
        id
    }

    /// Makes `version` the controller of every known session.
    ///
    /// Returns the number of sessions that changed controller.
    pub fn claim(&mut self, version: &str) -> usize {
        let mut claimed = 0;
        for controller in self.clients.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    pub fn controller_of(&self, client: &str) -> Option<&str> {
        self.clients.get(client).and_then(|c| c.as_deref())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl Worker {
    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state()
    }

    /// Records a page session; it is controlled immediately if the worker is active.
    ///
    /// Pages that send a stable client id are tracked once however often
    /// they reload.
    pub async fn register_client(&self, client_id: Option<String>) -> String {
        let mut lifecycle = self.lifecycle.write().await;
        let controller = (lifecycle.state() == WorkerState::Active)
            .then(|| self.config.cache_version.clone());
        lifecycle.register_client(client_id, controller)
    }

    pub async fn controller_of(&self, client: &str) -> Option<String> {
        self.lifecycle
            .read()
            .await
            .controller_of(client)
            .map(String::from)
    }

    // == Install ==
    /// Precaches the shell manifest and moves to `Waiting`.
    ///
    /// All-or-nothing: if any manifest asset cannot be fetched with an ok
    /// status, nothing is stored and the worker becomes `Redundant`.
    pub async fn install(&self) -> Result<()> {
        self.lifecycle.read().await.ensure(WorkerState::Installing)?;
        info!("Installing worker {}", self.config.cache_version);

        let assets = match self.fetch_manifest().await {
            Ok(assets) => assets,
            Err(e) => {
                error!("Install failed: {}", e);
                self.lifecycle.write().await.state = WorkerState::Redundant;
                return Err(e);
            }
        };

        info!("Caching {} static assets", assets.len());
        self.caches
            .write()
            .await
            .open(&self.config.cache_name(CacheKind::Shell));
        self.cache_responses(CacheKind::Shell, assets).await;

        self.lifecycle.write().await.state = WorkerState::Waiting;
        Ok(())
    }

    async fn fetch_manifest(&self) -> Result<Vec<(RequestKey, WorkerResponse)>> {
        let mut assets = Vec::with_capacity(self.config.precache.len());
        for path in &self.config.precache {
            let request = WorkerRequest::get(self.resolve(path)?);
            let response = self.fetcher.fetch(&request).await?;
            if !response.is_ok() {
                return Err(WorkerError::UpstreamStatus(response.status.as_u16()));
            }
            assets.push((RequestKey::from_request(&request), response));
        }
        Ok(assets)
    }

    // == Activate ==
    /// Purges caches from other versions and claims open page sessions.
    ///
    /// Returns the names of the deleted caches.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.lifecycle.read().await.ensure(WorkerState::Waiting)?;
        info!("Activating worker {}", self.config.cache_version);

        let deleted = {
            let mut caches = self.caches.write().await;
            let deleted = caches.purge_stale(&self.config.current_cache_names());
            if let Err(e) = self.snapshots.remove_caches(&deleted).await {
                warn!("Failed to drop stored copies of old caches: {}", e);
            }
            deleted
        };

        let mut lifecycle = self.lifecycle.write().await;
        let claimed = lifecycle.claim(&self.config.cache_version);
        lifecycle.state = WorkerState::Active;
        info!(
            "Worker active: deleted {} old caches, claimed {} clients",
            deleted.len(),
            claimed
        );
        Ok(deleted)
    }

    /// Install, then skip waiting and activate straight away.
    ///
    /// If install fails but this version's shell was stored by an earlier
    /// run, the worker activates over the stored caches instead of failing.
    pub async fn start(&self) -> Result<()> {
        if let Err(e) = self.install().await {
            if matches!(e, WorkerError::InvalidState(_)) || !self.has_stored_shell().await {
                return Err(e);
            }
            warn!(
                "Install of {} failed ({}), resuming with the stored shell",
                self.config.cache_version, e
            );
            self.lifecycle.write().await.state = WorkerState::Waiting;
        }
        self.activate().await?;
        Ok(())
    }

    /// Installs and activates a worker for a new cache version over the same
    /// cache storage and database, then marks this worker redundant.
    ///
    /// For hosts embedding the worker as a library. Page sessions carry over
    /// and are claimed by the successor. If the successor fails to install,
    /// this worker keeps serving.
    pub async fn upgrade(&self, config: Config) -> Result<Worker> {
        let successor = Worker::with_storage(
            config,
            self.fetcher.clone(),
            self.db.clone(),
            self.caches.clone(),
        )?;
        {
            let current = self.lifecycle.read().await;
            let mut next = successor.lifecycle.write().await;
            next.clients.clone_from(&current.clients);
            next.order.clone_from(&current.order);
        }

        successor.start().await?;
        self.supersede().await;
        Ok(successor)
    }

    /// Marks this worker as replaced by a newer version.
    pub async fn supersede(&self) {
        let mut lifecycle = self.lifecycle.write().await;
        if lifecycle.state != WorkerState::Redundant {
            info!("Worker {} superseded", self.config.cache_version);
            lifecycle.state = WorkerState::Redundant;
        }
    }
}
