//! Progress queue store.
//!
//! `append` propagates failures to the page-side caller. `read_all`,
//! `acknowledge` and `clear` are called from background sync and fall back
//! to safe defaults (an empty list, `false`) after logging.

use std::path::Path;

use tokio_rusqlite::{params, Connection};
use tracing::{debug, error};

use crate::db::Database;
use crate::error::{Result, WorkerError};
use crate::queue::ProgressRecord;

/// Durable queue of progress records, keyed by record id.
#[derive(Clone, Debug)]
pub struct ProgressQueue {
    conn: Connection,
}

impl ProgressQueue {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open the queue of the database at `path`, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Database::open(path).await?.queue())
    }

    /// Open an in-memory queue for testing.
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Database::open_in_memory().await?.queue())
    }

    // == Append ==
    /// Adds a record, replacing any queued record with the same id.
    pub async fn append(&self, record: ProgressRecord) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)?;
        let id = record.id;
        self.conn
            .call(move |conn| -> Result<()> {
                conn.execute(
                    "INSERT INTO progress (id, payload, queued_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                        payload = excluded.payload,
                        queued_at = excluded.queued_at",
                    params![id, payload, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await?;
        debug!("Queued progress record");
        Ok(())
    }

    // == Read All ==
    /// All queued records ordered by id, or an error from the store.
    pub async fn try_read_all(&self) -> Result<Vec<ProgressRecord>> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<(String, String)>> {
                let mut stmt = conn.prepare("SELECT id, payload FROM progress ORDER BY id")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, payload)| -> Result<ProgressRecord> {
                Ok(ProgressRecord::new(id, serde_json::from_str(&payload)?))
            })
            .collect()
    }

    /// All queued records; an empty list if the store fails.
    pub async fn read_all(&self) -> Vec<ProgressRecord> {
        match self.try_read_all().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to get progress data: {}", e);
                Vec::new()
            }
        }
    }

    // == Acknowledge ==
    /// Deletes the given records if they are still queued unchanged.
    ///
    /// A record re-appended with a new payload since it was read is kept.
    pub async fn try_acknowledge(&self, records: &[ProgressRecord]) -> Result<usize> {
        let sent = records
            .iter()
            .map(|r| -> Result<(String, String)> {
                Ok((r.id.clone(), serde_json::to_string(&r.payload)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let removed = self
            .conn
            .call(move |conn| -> Result<usize> {
                let tx = conn.transaction()?;
                let mut removed = 0;
                {
                    let mut stmt =
                        tx.prepare("DELETE FROM progress WHERE id = ?1 AND payload = ?2")?;
                    for (id, payload) in &sent {
                        removed += stmt.execute(params![id, payload])?;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    /// Deletes delivered records; `false` if the store fails.
    pub async fn acknowledge(&self, records: &[ProgressRecord]) -> bool {
        match self.try_acknowledge(records).await {
            Ok(removed) => {
                debug!("Acknowledged {} of {} progress records", removed, records.len());
                true
            }
            Err(e) => {
                error!("Failed to remove synced progress data: {}", e);
                false
            }
        }
    }

    // == Clear ==
    /// Deletes every queued record.
    pub async fn try_clear(&self) -> Result<usize> {
        let removed = self
            .conn
            .call(|conn| -> Result<usize> { Ok(conn.execute("DELETE FROM progress", [])?) })
            .await?;
        Ok(removed)
    }

    /// Deletes every queued record; `false` if the store fails.
    pub async fn clear(&self) -> bool {
        match self.try_clear().await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to clear progress data: {}", e);
                false
            }
        }
    }

    /// Number of queued records.
    pub async fn len(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| -> Result<i64> {
                Ok(conn.query_row("SELECT COUNT(*) FROM progress", [], |row| row.get(0))?)
            })
            .await?;
        Ok(count as usize)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Closes the underlying connection. Later calls fail.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| WorkerError::Storage(e.to_string()))
    }
}
