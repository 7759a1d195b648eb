//! Request and Response models for the worker
//!
//! This module defines the page↔worker message protocol and the DTOs used
//! for serializing/deserializing control-surface and upstream bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{DownloadRequest, ProgressSyncRequest, SyncTrigger, WorkerMessage};
pub use responses::{
    AppendResponse, CacheStatsEntry, ClickResponse, DownloadResult, HealthResponse,
    OfflineErrorBody, StatsResponse, SyncAccepted, WorkerReply,
};
