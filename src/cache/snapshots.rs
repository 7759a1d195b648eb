//! Cache snapshots.
//!
//! Write-through copy of the named caches in the worker database. The
//! in-memory [`CacheStorage`] answers lookups; this table lets it be rebuilt
//! after a restart.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use tokio_rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStorage, RequestKey};
use crate::error::{Result, WorkerError};
use crate::network::WorkerResponse;

/// One stored row: cache name, method, url, status, headers JSON, body, stored_at.
type SnapshotRow = (String, String, String, i64, String, Vec<u8>, i64);

/// Persisted cache entries, keyed by cache name and request identity.
#[derive(Clone, Debug)]
pub struct CacheSnapshots {
    conn: Connection,
}

impl CacheSnapshots {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace the stored copy of an entry.
    pub async fn save(&self, cache_name: &str, key: &RequestKey, entry: &CacheEntry) -> Result<()> {
        let headers = encode_headers(&entry.response.headers)?;
        let cache_name = cache_name.to_string();
        let method = key.method.to_string();
        let url = key.url.clone();
        let status = i64::from(entry.response.status.as_u16());
        let body = entry.response.body.to_vec();
        let stored_at = entry.stored_at as i64;

        self.conn
            .call(move |conn| -> Result<()> {
                conn.execute(
                    "INSERT INTO cache_entries
                        (cache_name, method, url, status, headers, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(cache_name, method, url) DO UPDATE SET
                        status = excluded.status,
                        headers = excluded.headers,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![cache_name, method, url, status, headers, body, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(WorkerError::from)
    }

    /// Delete the stored copies of `keys` in one cache.
    pub async fn remove(&self, cache_name: &str, keys: &[RequestKey]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let cache_name = cache_name.to_string();
        let keys: Vec<(String, String)> = keys
            .iter()
            .map(|k| (k.method.to_string(), k.url.clone()))
            .collect();

        self.conn
            .call(move |conn| -> Result<usize> {
                let tx = conn.transaction()?;
                let mut removed = 0;
                {
                    let mut stmt = tx.prepare(
                        "DELETE FROM cache_entries WHERE cache_name = ?1 AND method = ?2 AND url = ?3",
                    )?;
                    for (method, url) in &keys {
                        removed += stmt.execute(params![cache_name, method, url])?;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(WorkerError::from)
    }

    /// Delete every stored entry of the named caches.
    pub async fn remove_caches(&self, names: &[String]) -> Result<usize> {
        if names.is_empty() {
            return Ok(0);
        }
        let names = names.to_vec();

        self.conn
            .call(move |conn| -> Result<usize> {
                let tx = conn.transaction()?;
                let mut removed = 0;
                {
                    let mut stmt = tx.prepare("DELETE FROM cache_entries WHERE cache_name = ?1")?;
                    for name in &names {
                        removed += stmt.execute(params![name])?;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(WorkerError::from)
    }

    /// Rebuild cache storage from the stored rows, in insertion order.
    ///
    /// Rows that no longer decode are skipped with a warning.
    pub async fn load(&self) -> Result<CacheStorage> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<SnapshotRow>> {
                let mut stmt = conn.prepare(
                    "SELECT cache_name, method, url, status, headers, body, stored_at
                     FROM cache_entries ORDER BY id",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut storage = CacheStorage::new();
        let mut restored = 0;
        for row in rows {
            match decode(row) {
                Ok((name, key, entry)) => {
                    storage.restore(&name, key, entry);
                    restored += 1;
                }
                Err(e) => warn!("Skipping unreadable cache snapshot: {}", e),
            }
        }
        debug!("Restored {} cache entries", restored);
        Ok(storage)
    }

    /// Number of stored entries across all caches.
    pub async fn len(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| -> Result<i64> {
                Ok(conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?)
            })
            .await?;
        Ok(count as usize)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

fn encode_headers(headers: &HeaderMap) -> Result<String> {
    let pairs: Vec<(&str, &str)> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();
    Ok(serde_json::to_string(&pairs)?)
}

fn decode(row: SnapshotRow) -> Result<(String, RequestKey, CacheEntry)> {
    let (name, method, url, status, headers, body, stored_at) = row;

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|e| WorkerError::Storage(format!("bad method {:?}: {}", method, e)))?;
    let status = u16::try_from(status)
        .ok()
        .and_then(|s| StatusCode::from_u16(s).ok())
        .ok_or_else(|| WorkerError::Storage(format!("bad status {}", status)))?;

    let mut header_map = HeaderMap::new();
    for (header, value) in serde_json::from_str::<Vec<(String, String)>>(&headers)? {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| WorkerError::Storage(format!("bad header name {:?}: {}", header, e)))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| WorkerError::Storage(format!("bad header value: {}", e)))?;
        header_map.append(header, value);
    }

    let response = WorkerResponse {
        status,
        headers: header_map,
        body: Bytes::from(body),
    };
    let entry = CacheEntry {
        response,
        stored_at: stored_at.max(0) as u64,
    };
    Ok((name, RequestKey::new(method, url), entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use axum::http::header;
    use tempfile::TempDir;

    fn entry(body: &'static str) -> CacheEntry {
        CacheEntry::new(
            WorkerResponse::new(StatusCode::OK, body)
                .with_header(header::CONTENT_LENGTH, &body.len().to_string())
                .with_header(header::CONTENT_TYPE, "video/mp4"),
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let snapshots = Database::open_in_memory().await.unwrap().snapshots();
        let key = RequestKey::get("http://x/videos/1.mp4");
        let saved = entry("video");
        snapshots.save("v1-offline", &key, &saved).await.unwrap();

        let mut storage = snapshots.load().await.unwrap();
        assert_eq!(storage.keys(), vec!["v1-offline".to_string()]);

        let cache = storage.get("v1-offline").unwrap();
        let restored = cache.entry(&key).unwrap();
        assert_eq!(restored.stored_at, saved.stored_at);
        assert_eq!(restored.response.headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(storage.match_any(&key).unwrap().body, "video");
    }

    #[tokio::test]
    async fn test_save_replaces_same_key() {
        let snapshots = Database::open_in_memory().await.unwrap().snapshots();
        let key = RequestKey::get("http://x/");
        snapshots.save("v1-shell", &key, &entry("old")).await.unwrap();
        snapshots.save("v1-shell", &key, &entry("new")).await.unwrap();

        assert_eq!(snapshots.len().await.unwrap(), 1);
        let mut storage = snapshots.load().await.unwrap();
        assert_eq!(storage.match_any(&key).unwrap().body, "new");
    }

    #[tokio::test]
    async fn test_remove_entries_and_caches() {
        let snapshots = Database::open_in_memory().await.unwrap().snapshots();
        let a = RequestKey::get("http://x/a");
        let b = RequestKey::get("http://x/b");
        snapshots.save("v1-shell", &a, &entry("a")).await.unwrap();
        snapshots.save("v1-shell", &b, &entry("b")).await.unwrap();
        snapshots.save("v0-shell", &a, &entry("old")).await.unwrap();

        assert_eq!(snapshots.remove("v1-shell", &[a.clone()]).await.unwrap(), 1);
        assert_eq!(snapshots.remove_caches(&["v0-shell".to_string()]).await.unwrap(), 1);

        let storage = snapshots.load().await.unwrap();
        assert_eq!(storage.keys(), vec!["v1-shell".to_string()]);
        assert_eq!(storage.get("v1-shell").unwrap().keys(), vec![b]);
    }

    #[tokio::test]
    async fn test_snapshots_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("worker.db");
        let key = RequestKey::get("http://x/lesson.pdf");

        {
            let db = Database::open(&path).await.unwrap();
            db.snapshots().save("v1-offline", &key, &entry("pdf")).await.unwrap();
            db.close().await.unwrap();
        }

        let mut storage = Database::open(&path).await.unwrap().snapshots().load().await.unwrap();
        assert_eq!(storage.match_any(&key).unwrap().body, "pdf");
    }
}
