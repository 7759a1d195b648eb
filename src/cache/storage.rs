//! Cache Storage Module
//!
//! The set of named caches visible to the worker, with lazy creation,
//! cross-cache lookup and version purging.

use std::collections::HashMap;

use tracing::info;

use crate::cache::{CacheEntry, CacheStats, NamedCache, RequestKey, BYTES_PER_MB};
use crate::network::WorkerResponse;

// == Cache Storage ==
/// All named caches, in creation order.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, NamedCache>,
    /// Cache names in creation order; `match_any` searches in this order
    order: Vec<String>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    // == Open ==
    /// Returns the named cache, creating it on first use.
    pub fn open(&mut self, name: &str) -> &mut NamedCache {
        if !self.caches.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| NamedCache::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&NamedCache> {
        self.caches.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Names of all existing caches in creation order.
    pub fn keys(&self) -> Vec<String> {
        self.order.clone()
    }

    // == Delete ==
    pub fn delete(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.caches.remove(name).is_some()
    }

    // == Put ==
    /// Stores a response in the named cache. See [`NamedCache::put`].
    pub fn put(&mut self, name: &str, key: RequestKey, response: WorkerResponse) -> bool {
        self.open(name).put(key, response)
    }

    /// Reinstates a stored entry in the named cache. See [`NamedCache::restore`].
    pub fn restore(&mut self, name: &str, key: RequestKey, entry: CacheEntry) {
        self.open(name).restore(key, entry)
    }

    // == Enforce Limit ==
    /// Applies a budget of `max_size_mb` to the named cache.
    ///
    /// Returns the evicted keys; a cache that does not exist has nothing
    /// to evict.
    pub fn enforce_limit(&mut self, name: &str, max_size_mb: u64) -> Vec<RequestKey> {
        match self.caches.get_mut(name) {
            Some(cache) => cache.evict_over_budget(max_size_mb.saturating_mul(BYTES_PER_MB)),
            None => Vec::new(),
        }
    }

    // == Match Any ==
    /// Looks `key` up across the caches in order and returns the first hit.
    ///
    /// Every cache searched without a hit records a miss.
    pub fn match_any(&mut self, key: &RequestKey) -> Option<WorkerResponse> {
        for name in &self.order {
            if let Some(cache) = self.caches.get_mut(name) {
                if let Some(response) = cache.match_request(key) {
                    return Some(response);
                }
            }
        }
        None
    }

    // == Purge Stale ==
    /// Deletes every cache whose name is not in `current`.
    ///
    /// Returns the names of the deleted caches.
    pub fn purge_stale(&mut self, current: &[String]) -> Vec<String> {
        let stale: Vec<String> = self
            .order
            .iter()
            .filter(|name| !current.contains(*name))
            .cloned()
            .collect();

        for name in &stale {
            info!("Deleting old cache: {}", name);
            self.delete(name);
        }
        stale
    }

    /// Statistics of every cache, in creation order.
    pub fn stats(&self) -> Vec<(String, CacheStats)> {
        self.order
            .iter()
            .filter_map(|name| self.caches.get(name).map(|c| (name.clone(), c.stats())))
            .collect()
    }
}
