//! Request DTOs
//!
//! Messages posted to the worker and bodies the worker sends upstream.

use serde::{Deserialize, Serialize};

use crate::queue::ProgressRecord;

/// Page→worker message, tagged by `type` with its data under `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Fetch a resource and keep it in the offline-content cache
    DownloadOfflineContent(DownloadRequest),
}

/// Payload of `DOWNLOAD_OFFLINE_CONTENT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub content_id: String,
    /// Absolute URL, or a path resolved against the upstream origin
    pub content_url: String,
    pub content_type: String,
}

impl DownloadRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.content_id.is_empty() {
            return Some("contentId cannot be empty".to_string());
        }
        if self.content_url.trim().is_empty() {
            return Some("contentUrl cannot be empty".to_string());
        }
        None
    }
}

/// Body of `POST /_worker/sync`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncTrigger {
    pub tag: String,
}

/// Body of the bulk progress upload.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSyncRequest<'a> {
    pub progress: &'a [ProgressRecord],
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_download_message_deserialize() {
        let json = r#"{
            "type": "DOWNLOAD_OFFLINE_CONTENT",
            "payload": {"contentId": "x", "contentUrl": "http://example/a", "contentType": "video"}
        }"#;
        let msg: WorkerMessage = serde_json::from_str(json).unwrap();
        let WorkerMessage::DownloadOfflineContent(req) = msg;
        assert_eq!(req.content_id, "x");
        assert_eq!(req.content_url, "http://example/a");
        assert_eq!(req.content_type, "video");
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let json = r#"{"type": "SKIP_WAITING", "payload": {}}"#;
        assert!(serde_json::from_str::<WorkerMessage>(json).is_err());
    }

    #[test]
    fn test_validate() {
        let mut req = DownloadRequest {
            content_id: "c1".to_string(),
            content_url: "/lessons/1.mp4".to_string(),
            content_type: "video".to_string(),
        };
        assert!(req.validate().is_none());

        req.content_url = " ".to_string();
        assert!(req.validate().is_some());

        req.content_id = String::new();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_sync_request_serialize() {
        let progress = vec![ProgressRecord::from_value("p1", json!({"score": 3}))];
        let body = ProgressSyncRequest {
            progress: &progress,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"progress": [{"id": "p1", "score": 3}]}));
    }
}
