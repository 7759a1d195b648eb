//! Durable Queue Module
//!
//! SQLite-backed store of progress records awaiting delivery to the server.
//! Records survive restarts and are removed only after a successful sync.

mod record;
mod store;

pub use record::ProgressRecord;
pub use store::ProgressQueue;
