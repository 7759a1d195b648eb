//! Upstream fetcher abstraction.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use tracing::debug;

use crate::error::{Result, WorkerError};
use crate::network::{WorkerRequest, WorkerResponse};

/// Performs outbound requests on behalf of the worker.
///
/// An `Err` means the request never produced a response (refused, reset,
/// transport timeout). Any HTTP status, including 4xx/5xx, is an `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &WorkerRequest) -> Result<WorkerResponse>;
}

/// Headers that describe the hop to the worker rather than the request itself.
const HOP_HEADERS: [header::HeaderName; 5] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Headers of the upstream hop that must not be stored or replayed.
///
/// `content-length` stays: it sizes cache entries and matches the
/// fully buffered body.
const RESPONSE_HOP_HEADERS: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
    header::PROXY_AUTHENTICATE,
];

/// Default fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a client whose transport timeout applies to every request.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| WorkerError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn without_headers(headers: &HeaderMap, names: &[header::HeaderName]) -> HeaderMap {
    let mut kept = headers.clone();
    for name in names {
        kept.remove(name);
    }
    kept
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    without_headers(headers, &HOP_HEADERS)
}

fn stored_headers(headers: &HeaderMap) -> HeaderMap {
    without_headers(headers, &RESPONSE_HOP_HEADERS)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &WorkerRequest) -> Result<WorkerResponse> {
        debug!("Fetching {} {}", request.method, request.url);

        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(forwarded_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = stored_headers(response.headers());
        let body = response.bytes().await?;

        Ok(WorkerResponse {
            status,
            headers,
            body,
        })
    }
}
