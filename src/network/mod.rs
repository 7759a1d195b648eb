//! Network Module
//!
//! Request/response types, the upstream fetcher seam, and the timing
//! helpers (timeout race, retry with backoff) used by the fetch policy.

mod fetcher;
mod retry;
mod timeout;
mod types;

pub use fetcher::{Fetcher, HttpFetcher};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use timeout::with_timeout;
pub use types::{WorkerRequest, WorkerResponse, CLIENT_ID_HEADER};
