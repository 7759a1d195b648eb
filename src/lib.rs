//! Offline Worker - caching and background sync for low-connectivity clients
//!
//! Sits between a page and its origin: answers fetches from the network or
//! from versioned caches, downloads content for offline use, and queues
//! progress records until they can be synced.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod network;
pub mod queue;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use config::Config;
pub use db::Database;
pub use error::{Result, WorkerError};
pub use tasks::spawn_connectivity_monitor;
pub use worker::Worker;
