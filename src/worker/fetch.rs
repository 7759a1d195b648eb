//! Network fetch policy for intercepted requests.
//!
//! API routes go network-first with the transport's own timeout; static
//! routes race the network against a fixed timer. Both fall back to the
//! caches, and neither ever surfaces an error to the page.

use axum::http::{Method, StatusCode};
use tracing::{debug, info};

use crate::cache::{CacheKind, RequestKey};
use crate::models::OfflineErrorBody;
use crate::network::{with_timeout, WorkerRequest, WorkerResponse};
use crate::worker::Worker;

/// Path prefix that selects the API route.
pub const API_PREFIX: &str = "/api/";

/// Structured 503 returned for API requests with no network and no cache.
pub fn offline_response() -> WorkerResponse {
    WorkerResponse::json(StatusCode::SERVICE_UNAVAILABLE, &OfflineErrorBody::now())
        .unwrap_or_else(|_| WorkerResponse::new(StatusCode::SERVICE_UNAVAILABLE, "offline"))
}

/// Minimal response for static requests with nothing to fall back on.
pub fn not_found_response() -> WorkerResponse {
    WorkerResponse::new(StatusCode::NOT_FOUND, "")
}

impl Worker {
    // == Fetch Event ==
    /// Answers an intercepted request, routing by path class.
    pub async fn handle_fetch(&self, request: WorkerRequest) -> WorkerResponse {
        if request.navigate {
            self.register_client(request.client_id.clone()).await;
        }

        if request.path().starts_with(API_PREFIX) {
            self.handle_api_request(request).await
        } else {
            self.handle_static_request(request).await
        }
    }

    // == API Route ==
    /// Network first; successful GETs refresh the API cache.
    pub async fn handle_api_request(&self, request: WorkerRequest) -> WorkerResponse {
        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if request.method == Method::GET && response.is_ok() {
                    self.cache_response(
                        CacheKind::Api,
                        RequestKey::from_request(&request),
                        response.clone(),
                    )
                    .await;
                }
                response
            }
            Err(e) => {
                info!("Network request failed, trying cache: {} ({})", request.url, e);
                match self.match_cached(&RequestKey::from_request(&request)).await {
                    Some(cached) => cached,
                    None => {
                        debug!("No cached response for {}, answering offline", request.url);
                        offline_response()
                    }
                }
            }
        }
    }

    // == Static Route ==
    /// Network raced against the static timeout; falls back to the caches,
    /// then to the cached root document for navigations, then to a 404.
    pub async fn handle_static_request(&self, request: WorkerRequest) -> WorkerResponse {
        let timeout = self.config.static_timeout();
        match with_timeout(timeout, self.fetcher.fetch(&request)).await {
            Ok(response) => {
                if response.is_ok() {
                    self.cache_response(
                        CacheKind::Shell,
                        RequestKey::from_request(&request),
                        response.clone(),
                    )
                    .await;
                }
                response
            }
            Err(e) => {
                info!("Network request failed, trying cache: {} ({})", request.url, e);
                if let Some(cached) = self.match_cached(&RequestKey::from_request(&request)).await {
                    return cached;
                }

                if request.navigate {
                    if let Ok(root) = self.resolve("/") {
                        if let Some(shell) = self.match_cached(&RequestKey::get(root)).await {
                            debug!("Serving cached root document for {}", request.url);
                            return shell;
                        }
                    }
                }

                not_found_response()
            }
        }
    }
}
