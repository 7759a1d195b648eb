//! Cache Entry Module
//!
//! Request identity and the captured response stored under it.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, Method};

use crate::error::{Result, WorkerError};
use crate::network::{WorkerRequest, WorkerResponse};

// == Request Key ==
/// Request identity used as the cache key: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    /// Key of a GET for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn from_request(request: &WorkerRequest) -> Self {
        Self::new(request.method.clone(), request.url.clone())
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

// == Cache Entry ==
/// A captured response with its capture time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored response
    pub response: WorkerResponse,
    /// Capture timestamp (Unix milliseconds)
    pub stored_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    pub fn new(response: WorkerResponse) -> Self {
        Self {
            response,
            stored_at: current_timestamp_ms(),
        }
    }

    // == Approximate Size ==
    /// Declared size of the entry taken from its `content-length` header.
    ///
    /// A missing header yields `Ok(0)`. A header that is present but not a
    /// valid byte count is an error; eviction logs it and counts zero.
    pub fn approximate_size(&self) -> Result<u64> {
        match self.response.headers.get(header::CONTENT_LENGTH) {
            None => Ok(0),
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or_else(|| {
                    WorkerError::Internal(format!("unparseable content-length {:?}", value))
                }),
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
