//! Response DTOs
//!
//! Replies to the page and bodies of control-surface responses.

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;

/// Worker→page reply, tagged like [`crate::models::WorkerMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerReply {
    DownloadComplete(DownloadResult),
}

/// Payload of `DOWNLOAD_COMPLETE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub content_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn succeeded(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(content_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Body of the synthesized 503 returned for API requests while offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineErrorBody {
    /// Always `"offline"`
    pub error: String,
    pub message: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl OfflineErrorBody {
    pub fn now() -> Self {
        Self {
            error: "offline".to_string(),
            message: "You are currently offline. Please check your internet connection."
                .to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Response body for `POST /_worker/sync`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncAccepted {
    pub tag: String,
    /// False when the tag is not one the worker handles
    pub accepted: bool,
}

/// Response body for `POST /_worker/progress`.
#[derive(Debug, Clone, Serialize)]
pub struct AppendResponse {
    pub message: String,
    pub id: String,
}

impl AppendResponse {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            message: format!("Progress '{}' queued", id),
            id,
        }
    }
}

/// Response body for a notification click.
#[derive(Debug, Clone, Serialize)]
pub struct ClickResponse {
    /// URL the page should open, if the notification carried one
    pub url: Option<String>,
}

/// Statistics of one named cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsEntry {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_entries: usize,
    pub approximate_bytes: u64,
    pub hit_rate: f64,
}

impl CacheStatsEntry {
    pub fn new(name: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            name: name.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            approximate_bytes: stats.approximate_bytes,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the stats endpoint (GET /_worker/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Lifecycle state of the worker
    pub state: String,
    /// Last observed connectivity
    pub online: bool,
    /// Progress records awaiting sync
    pub queued: usize,
    /// Page sessions known to the worker
    pub clients: usize,
    pub caches: Vec<CacheStatsEntry>,
}

/// Response body for the health endpoint (GET /_worker/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_download_failure_reply_serialize() {
        let reply = WorkerReply::DownloadComplete(DownloadResult::failed("x", "404"));
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "DOWNLOAD_COMPLETE",
                "payload": {"contentId": "x", "success": false, "error": "404"}
            })
        );
    }

    #[test]
    fn test_download_success_omits_error() {
        let reply = WorkerReply::DownloadComplete(DownloadResult::succeeded("x"));
        let json = serde_json::to_string(&reply).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains(r#""success":true"#));
    }

    #[test]
    fn test_offline_body() {
        let body = OfflineErrorBody::now();
        assert_eq!(body.error, "offline");
        assert!(!body.message.is_empty());
        assert!(body.timestamp > 0);
    }

    #[test]
    fn test_cache_stats_entry_hit_rate() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        let entry = CacheStatsEntry::new("v1-api", &stats);
        assert_eq!(entry.hit_rate, 0.5);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
