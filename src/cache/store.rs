//! Named Cache Module
//!
//! A single named response cache with content-length based size accounting.

use std::collections::HashMap;

use axum::http::Method;
use tracing::{info, warn};

use crate::cache::{CacheEntry, CacheStats, RequestKey, BYTES_PER_MB};
use crate::network::WorkerResponse;

// == Named Cache ==
/// Response storage keyed by request identity.
///
/// Entries are held in a `HashMap`, so enumeration order is unspecified and
/// eviction removes "some entries over budget" rather than the oldest ones.
#[derive(Debug)]
pub struct NamedCache {
    /// Versioned cache identifier
    name: String,
    /// Captured responses
    entries: HashMap<RequestKey, CacheEntry>,
    /// Lookup and eviction statistics
    stats: CacheStats,
}

impl NamedCache {
    // == Constructor ==
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // == Put ==
    /// Stores `response` under `key`.
    ///
    /// Only successful GET responses are stored; anything else is ignored
    /// and `false` is returned. Replaces an existing entry for the same key.
    pub fn put(&mut self, key: RequestKey, response: WorkerResponse) -> bool {
        if key.method != Method::GET || !response.is_ok() {
            return false;
        }
        self.entries.insert(key, CacheEntry::new(response));
        self.stats.set_total_entries(self.entries.len());
        true
    }

    /// Reinstates a previously stored entry, keeping its capture time.
    pub fn restore(&mut self, key: RequestKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    pub fn entry(&self, key: &RequestKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Match ==
    /// Looks up the stored response for `key`, recording a hit or miss.
    pub fn match_request(&mut self, key: &RequestKey) -> Option<WorkerResponse> {
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.response.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// True when an entry exists for `key`. Does not touch statistics.
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries.contains_key(key)
    }

    // == Delete ==
    pub fn delete(&mut self, key: &RequestKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        self.entries.keys().cloned().collect()
    }

    // == Enforce Limit ==
    /// Evicts entries until the scanned approximate size is within `max_bytes`.
    ///
    /// Entries are scanned in enumeration order while accumulating their
    /// declared sizes; every entry reached once the running total exceeds
    /// the budget is marked, and all marked entries are deleted afterwards.
    /// An entry whose size cannot be determined is logged and counted as 0.
    ///
    /// Returns the number of evicted entries.
    pub fn enforce_limit(&mut self, max_bytes: u64) -> usize {
        self.evict_over_budget(max_bytes).len()
    }

    /// [`enforce_limit`](Self::enforce_limit), returning the evicted keys.
    pub fn evict_over_budget(&mut self, max_bytes: u64) -> Vec<RequestKey> {
        let mut total: u64 = 0;
        let mut marked = Vec::new();

        for (key, entry) in &self.entries {
            let size = match entry.approximate_size() {
                Ok(size) => size,
                Err(e) => {
                    warn!("Error calculating size of {} in {}: {}", key, self.name, e);
                    0
                }
            };
            total = total.saturating_add(size);
            if total > max_bytes {
                marked.push(key.clone());
            }
        }

        if !marked.is_empty() {
            info!(
                "Cache {} over its {} MB budget, deleting {} entries",
                self.name,
                max_bytes / BYTES_PER_MB,
                marked.len()
            );
            for key in &marked {
                self.entries.remove(key);
            }
            self.stats.record_evictions(marked.len());
            self.stats.set_total_entries(self.entries.len());
        }

        marked
    }

    // == Approximate Size ==
    /// Sum of declared sizes of all entries, invalid sizes counting zero.
    pub fn approximate_size(&self) -> u64 {
        self.entries
            .values()
            .map(|entry| entry.approximate_size().unwrap_or(0))
            .sum()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats.set_approximate_bytes(self.approximate_size());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};

    fn sized(bytes: u64) -> WorkerResponse {
        WorkerResponse::new(StatusCode::OK, "x").with_header(header::CONTENT_LENGTH, &bytes.to_string())
    }

    fn key(n: usize) -> RequestKey {
        RequestKey::get(format!("http://localhost/asset/{}", n))
    }

    #[test]
    fn test_put_and_match() {
        let mut cache = NamedCache::new("v1-shell");
        assert!(cache.put(key(1), sized(10)));

        let hit = cache.match_request(&key(1)).unwrap();
        assert_eq!(hit.status, StatusCode::OK);
        assert!(cache.match_request(&key(2)).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.approximate_bytes, 10);
    }

    #[test]
    fn test_put_ignores_non_get() {
        let mut cache = NamedCache::new("v1-api");
        let post = RequestKey::new(Method::POST, "http://localhost/api/progress");
        assert!(!cache.put(post, sized(10)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_ignores_error_status() {
        let mut cache = NamedCache::new("v1-api");
        let response = WorkerResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(!cache.put(key(1), response));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = NamedCache::new("v1-shell");
        cache.put(key(1), sized(10));
        cache.put(key(1), sized(30));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.approximate_size(), 30);
    }

    #[test]
    fn test_enforce_limit_under_budget() {
        let mut cache = NamedCache::new("v1-shell");
        for n in 0..4 {
            cache.put(key(n), sized(100));
        }
        assert_eq!(cache.enforce_limit(400), 0);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_enforce_limit_over_budget() {
        let mut cache = NamedCache::new("v1-shell");
        for n in 0..5 {
            cache.put(key(n), sized(100));
        }
        // Running totals 100..500 against 250: the last three are marked.
        assert_eq!(cache.enforce_limit(250), 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.approximate_size() <= 250);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_enforce_limit_missing_length_counts_zero() {
        let mut cache = NamedCache::new("v1-offline");
        for n in 0..10 {
            cache.put(key(n), WorkerResponse::new(StatusCode::OK, vec![0u8; 4096]));
        }
        // Real bytes far exceed the budget, declared bytes are zero.
        assert_eq!(cache.enforce_limit(1024), 0);
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_enforce_limit_skips_invalid_size_and_continues() {
        let mut cache = NamedCache::new("v1-shell");
        cache.put(
            key(0),
            WorkerResponse::new(StatusCode::OK, "x").with_header(header::CONTENT_LENGTH, "garbage"),
        );
        cache.put(key(1), sized(300));
        cache.put(key(2), sized(300));

        // The invalid entry counts as zero and the scan still reaches the
        // sized entries, so the pass evicts past the 500 byte budget.
        let evicted = cache.enforce_limit(500);
        assert!(evicted >= 1);
        assert!(cache.approximate_size() <= 500);

        let mut cache = NamedCache::new("v1-shell");
        cache.put(
            key(0),
            WorkerResponse::new(StatusCode::OK, "x").with_header(header::CONTENT_LENGTH, "garbage"),
        );
        cache.put(key(1), sized(300));
        assert_eq!(cache.enforce_limit(500), 0);
        assert!(cache.contains(&key(0)));
    }

    #[test]
    fn test_enforce_limit_idempotent() {
        let mut cache = NamedCache::new("v1-api");
        for n in 0..8 {
            cache.put(key(n), sized(64));
        }
        let first = cache.enforce_limit(200);
        assert!(first > 0);
        assert_eq!(cache.enforce_limit(200), 0);
    }

    #[test]
    fn test_delete() {
        let mut cache = NamedCache::new("v1-shell");
        cache.put(key(1), sized(1));
        assert!(cache.delete(&key(1)));
        assert!(!cache.delete(&key(1)));
        assert!(cache.is_empty());
    }
}
