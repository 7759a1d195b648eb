//! API Handlers
//!
//! HTTP request handlers for the control surface and the intercepted-fetch
//! fallback.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, WorkerError};
use crate::models::{
    AppendResponse, ClickResponse, HealthResponse, StatsResponse, SyncAccepted, SyncTrigger,
    WorkerMessage, WorkerReply,
};
use crate::network::WorkerRequest;
use crate::queue::ProgressRecord;
use crate::worker::{Notification, Worker, SYNC_TAG};

/// Largest request body forwarded upstream or accepted on the control surface.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<Worker>,
}

impl AppState {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker }
    }
}

/// Parses a JSON body, reporting malformed input as a bad request.
fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| WorkerError::InvalidRequest(e.to_string()))
}

/// Handler for POST /_worker/message
///
/// Posts a page message to the worker and waits for its single reply.
pub async fn message_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<WorkerReply>> {
    let message: WorkerMessage = parse_json(&body)?;
    let (id, reply) = state.worker.post_message(message);
    debug!("Message {} posted", id);

    let reply = reply
        .await
        .map_err(|_| WorkerError::Internal(format!("message {} produced no reply", id)))?;
    Ok(Json(reply))
}

/// Handler for POST /_worker/sync
///
/// Fires a sync event; the flush runs in the background.
pub async fn sync_handler(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let trigger: SyncTrigger = parse_json(&body)?;
    let accepted = trigger.tag == SYNC_TAG;
    state.worker.dispatch_sync(trigger.tag.clone());

    let body = SyncAccepted {
        tag: trigger.tag,
        accepted,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// Handler for POST /_worker/progress
///
/// Appends a progress record to the durable queue.
pub async fn append_progress_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AppendResponse>> {
    let record: ProgressRecord = parse_json(&body)?;
    if record.id.is_empty() {
        return Err(WorkerError::InvalidRequest("id cannot be empty".to_string()));
    }

    let id = record.id.clone();
    state.worker.queue().append(record).await?;
    Ok(Json(AppendResponse::new(id)))
}

/// Handler for GET /_worker/progress
pub async fn list_progress_handler(State(state): State<AppState>) -> Result<Json<Vec<ProgressRecord>>> {
    Ok(Json(state.worker.queue().try_read_all().await?))
}

/// Handler for POST /_worker/push
///
/// The raw text body is the push payload.
pub async fn push_handler(State(state): State<AppState>, payload: String) -> Json<Notification> {
    let payload = (!payload.is_empty()).then_some(payload);
    Json(state.worker.handle_push(payload).await)
}

/// Handler for POST /_worker/notifications/:id/click
pub async fn notification_click_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ClickResponse>> {
    let url = state.worker.handle_notification_click(id).await?;
    Ok(Json(ClickResponse { url }))
}

/// Handler for GET /_worker/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.worker.stats().await)
}

/// Handler for GET /_worker/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Fallback handler: every request off the control surface is an
/// intercepted fetch answered by the worker's fetch policy.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body): (_, Body) = request.into_parts();
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| WorkerError::InvalidRequest(format!("Unreadable body: {}", e)))?;

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = state.worker.resolve_path(target)?;

    let navigate = WorkerRequest::is_navigation(&parts.method, &parts.headers);
    let mut upstream = WorkerRequest::new(parts.method, url).with_navigate(navigate);
    upstream.client_id = WorkerRequest::client_id_from(&parts.headers);
    upstream.headers = parts.headers;
    upstream.body = body;

    Ok(state.worker.handle_fetch(upstream).await.into_response())
}
