//! Schema migrations for the worker database.
//!
//! Tracks applied versions in a `_migrations` table; each migration runs once.

use tokio_rusqlite::{params, Connection};

use crate::error::{Result, WorkerError};

/// Migration list: (version, SQL), applied in order.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS progress (
            id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            queued_at TEXT NOT NULL
        );",
    ),
    (
        2,
        "CREATE TABLE IF NOT EXISTS cache_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cache_name TEXT NOT NULL,
            method TEXT NOT NULL,
            url TEXT NOT NULL,
            status INTEGER NOT NULL,
            headers TEXT NOT NULL,
            body BLOB NOT NULL,
            stored_at INTEGER NOT NULL,
            UNIQUE (cache_name, method, url)
        );
        CREATE INDEX IF NOT EXISTS idx_cache_entries_name ON cache_entries(cache_name);",
    ),
];

/// Run any pending migrations.
pub async fn run(conn: &Connection) -> Result<()> {
    conn.call(|conn| -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, sql) in MIGRATIONS {
            if *version > current {
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version, chrono::Utc::now().to_rfc3339()],
                )?;
            }
        }

        Ok(())
    })
    .await
    .map_err(WorkerError::from)
}
