//! Queued progress record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of locally captured progress awaiting server delivery.
///
/// Serialized flat: `{"id": "...", ...payload}`. The payload is opaque to
/// the worker and forwarded verbatim in the sync batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ProgressRecord {
    pub fn new(id: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Record keyed by `id` with the fields of a JSON object as payload.
    /// Non-object values are stored under `"value"`.
    pub fn from_value(id: impl Into<String>, value: Value) -> Self {
        let payload = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self::new(id, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_flat() {
        let record = ProgressRecord::from_value(
            "lesson-3",
            json!({"courseId": "math-101", "completed": true}),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"id": "lesson-3", "courseId": "math-101", "completed": true})
        );
    }

    #[test]
    fn test_record_deserializes_flat() {
        let record: ProgressRecord =
            serde_json::from_str(r#"{"id":"q1","score":80}"#).unwrap();
        assert_eq!(record.id, "q1");
        assert_eq!(record.payload["score"], 80);
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let record = ProgressRecord::from_value("x", json!(42));
        assert_eq!(record.payload["value"], 42);
    }

    #[test]
    fn test_record_requires_id() {
        let result: Result<ProgressRecord, _> = serde_json::from_str(r#"{"score":80}"#);
        assert!(result.is_err());
    }
}
