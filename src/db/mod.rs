//! Database Module
//!
//! The worker's single SQLite file. It holds the progress queue and the
//! snapshots of the named caches, so both survive a restart.

mod migrations;

use std::path::Path;

use tokio_rusqlite::Connection;

use crate::cache::CacheSnapshots;
use crate::error::{Result, WorkerError};
use crate::queue::ProgressQueue;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

/// Shared handle to the worker database.
#[derive(Clone, Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `path`, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| WorkerError::Storage(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| WorkerError::Storage(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| -> Result<()> {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await?;

        migrations::run(&conn).await?;
        Ok(Self { conn })
    }

    /// The progress queue stored in this database.
    pub fn queue(&self) -> ProgressQueue {
        ProgressQueue::new(self.conn.clone())
    }

    /// The cache snapshots stored in this database.
    pub fn snapshots(&self) -> CacheSnapshots {
        CacheSnapshots::new(self.conn.clone())
    }

    /// Closes the underlying connection. Every handle derived from it fails afterwards.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| WorkerError::Storage(e.to_string()))
    }
}
