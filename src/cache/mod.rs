//! Cache Module
//!
//! Named response caches with per-cache byte budgets and best-effort eviction,
//! mirrored to the worker database so they survive a restart.
//!
//! Sizes are approximated from each stored response's `content-length`
//! header. Responses without the header count as zero bytes, so a cache
//! holding chunked responses can exceed its budget in real bytes.

mod entry;
mod snapshots;
mod stats;
mod storage;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, RequestKey};
pub use snapshots::CacheSnapshots;
pub use stats::CacheStats;
pub use storage::CacheStorage;
pub use store::NamedCache;

// == Public Constants ==
/// Bytes per MB used when converting cache budgets
pub const BYTES_PER_MB: u64 = 1024 * 1024;

// == Cache Kind ==
/// The three caches owned by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Application shell: root document and core static assets
    Shell,
    /// Lesson and course material downloaded for offline use
    Offline,
    /// Recent successful API GET responses
    Api,
}

impl CacheKind {
    /// Lookup order used by `CacheStorage::match_any`.
    pub const ALL: [CacheKind; 3] = [CacheKind::Shell, CacheKind::Offline, CacheKind::Api];

    pub fn suffix(&self) -> &'static str {
        match self {
            CacheKind::Shell => "shell",
            CacheKind::Offline => "offline",
            CacheKind::Api => "api",
        }
    }
}
