//! Configuration Module
//!
//! Handles loading and managing worker configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheKind;
use crate::network::RetryPolicy;

/// Assets stored in the shell cache at install time.
pub const DEFAULT_PRECACHE: [&str; 4] = ["/", "/manifest.json", "/favicon.ico", "/logo.svg"];

/// Worker configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Origin that intercepted fetches are resolved against
    pub upstream_origin: String,
    /// Prefix shared by all named caches
    pub cache_prefix: String,
    /// Cache version; caches from other versions are purged on activation
    pub cache_version: String,
    /// Shell cache budget in MB
    pub shell_cache_mb: u64,
    /// Offline-content cache budget in MB
    pub offline_cache_mb: u64,
    /// API cache budget in MB
    pub api_cache_mb: u64,
    /// Timeout raced against static asset fetches, in milliseconds
    pub static_timeout_ms: u64,
    /// Transport timeout for every upstream request, in milliseconds
    pub request_timeout_ms: u64,
    /// SQLite file backing the progress queue
    pub database_path: String,
    /// Path of the bulk progress sync endpoint
    pub sync_path: String,
    /// Retries for offline downloads on transport failure
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    pub retry_base_delay_ms: u64,
    /// Connectivity check interval in seconds
    pub connectivity_interval: u64,
    /// Paths stored in the shell cache at install time
    pub precache: Vec<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_ORIGIN` - Upstream origin (default: http://127.0.0.1:8080)
    /// - `CACHE_PREFIX` / `CACHE_VERSION` - Cache naming (default: nabha / v1)
    /// - `SHELL_CACHE_MB`, `OFFLINE_CACHE_MB`, `API_CACHE_MB` - Budgets (50 / 100 / 25)
    /// - `STATIC_TIMEOUT_MS` - Static asset race timeout (default: 5000)
    /// - `REQUEST_TIMEOUT_MS` - Transport timeout (default: 30000)
    /// - `DATABASE_PATH` - Progress queue and cache snapshots (default: offline_worker.db)
    /// - `SYNC_PATH` - Sync endpoint path (default: /api/progress/sync)
    /// - `MAX_RETRIES`, `RETRY_BASE_DELAY_MS` - Download backoff (3 / 1000)
    /// - `CONNECTIVITY_INTERVAL` - Check interval in seconds (default: 30)
    /// - `PRECACHE_URLS` - Comma separated shell manifest
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let precache = env::var("PRECACHE_URLS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.precache);

        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            upstream_origin: env_or("UPSTREAM_ORIGIN", defaults.upstream_origin),
            cache_prefix: env_or("CACHE_PREFIX", defaults.cache_prefix),
            cache_version: env_or("CACHE_VERSION", defaults.cache_version),
            shell_cache_mb: env_or("SHELL_CACHE_MB", defaults.shell_cache_mb),
            offline_cache_mb: env_or("OFFLINE_CACHE_MB", defaults.offline_cache_mb),
            api_cache_mb: env_or("API_CACHE_MB", defaults.api_cache_mb),
            static_timeout_ms: env_or("STATIC_TIMEOUT_MS", defaults.static_timeout_ms),
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            database_path: env_or("DATABASE_PATH", defaults.database_path),
            sync_path: env_or("SYNC_PATH", defaults.sync_path),
            max_retries: env_or("MAX_RETRIES", defaults.max_retries),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            connectivity_interval: env_or("CONNECTIVITY_INTERVAL", defaults.connectivity_interval),
            precache,
        }
    }

    /// Versioned identifier of a named cache, e.g. `nabha-v1-shell`, or
    /// `v1-shell` when the prefix is empty.
    pub fn cache_name(&self, kind: CacheKind) -> String {
        if self.cache_prefix.is_empty() {
            format!("{}-{}", self.cache_version, kind.suffix())
        } else {
            format!("{}-{}-{}", self.cache_prefix, self.cache_version, kind.suffix())
        }
    }

    /// Identifiers of the three caches valid for the current version.
    pub fn current_cache_names(&self) -> Vec<String> {
        CacheKind::ALL
            .iter()
            .map(|kind| self.cache_name(*kind))
            .collect()
    }

    /// Size budget of a named cache in MB.
    pub fn cache_budget_mb(&self, kind: CacheKind) -> u64 {
        match kind {
            CacheKind::Shell => self.shell_cache_mb,
            CacheKind::Offline => self.offline_cache_mb,
            CacheKind::Api => self.api_cache_mb,
        }
    }

    pub fn static_timeout(&self) -> Duration {
        Duration::from_millis(self.static_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            upstream_origin: "http://127.0.0.1:8080".to_string(),
            cache_prefix: "nabha".to_string(),
            cache_version: "v1".to_string(),
            shell_cache_mb: 50,
            offline_cache_mb: 100,
            api_cache_mb: 25,
            static_timeout_ms: 5000,
            request_timeout_ms: 30_000,
            database_path: "offline_worker.db".to_string(),
            sync_path: "/api/progress/sync".to_string(),
            max_retries: 3,
            retry_base_delay_ms: 1000,
            connectivity_interval: 30,
            precache: DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.shell_cache_mb, 50);
        assert_eq!(config.offline_cache_mb, 100);
        assert_eq!(config.api_cache_mb, 25);
        assert_eq!(config.static_timeout_ms, 5000);
        assert_eq!(config.sync_path, "/api/progress/sync");
        assert_eq!(config.precache.len(), 4);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("SERVER_PORT");
        env::remove_var("SHELL_CACHE_MB");
        env::remove_var("STATIC_TIMEOUT_MS");
        env::remove_var("PRECACHE_URLS");

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.shell_cache_mb, 50);
        assert_eq!(config.static_timeout_ms, 5000);
        assert_eq!(config.precache[0], "/");
    }

    #[test]
    fn test_cache_names_are_versioned() {
        let config = Config::default();
        assert_eq!(config.cache_name(CacheKind::Shell), "nabha-v1-shell");
        assert_eq!(config.cache_name(CacheKind::Offline), "nabha-v1-offline");
        assert_eq!(config.cache_name(CacheKind::Api), "nabha-v1-api");
        assert_eq!(config.current_cache_names().len(), 3);

        let bare = Config {
            cache_prefix: String::new(),
            ..Config::default()
        };
        assert_eq!(
            bare.current_cache_names(),
            vec!["v1-shell", "v1-offline", "v1-api"]
        );
    }

    #[test]
    fn test_cache_budgets() {
        let config = Config::default();
        assert_eq!(config.cache_budget_mb(CacheKind::Shell), 50);
        assert_eq!(config.cache_budget_mb(CacheKind::Offline), 100);
        assert_eq!(config.cache_budget_mb(CacheKind::Api), 25);
    }
}
