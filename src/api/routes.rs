//! API Routes
//!
//! Configures the Axum router: the worker control surface under `/_worker`
//! and the intercepted-fetch fallback for everything else.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    append_progress_handler, health_handler, list_progress_handler, message_handler,
    notification_click_handler, proxy_handler, push_handler, stats_handler, sync_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /_worker/message` - Post a page message, wait for its reply
/// - `POST /_worker/sync` - Fire a sync event
/// - `POST /_worker/progress` - Queue a progress record
/// - `GET /_worker/progress` - List queued progress records
/// - `POST /_worker/push` - Deliver a push payload
/// - `POST /_worker/notifications/:id/click` - Click a notification
/// - `GET /_worker/stats` - Cache and worker statistics
/// - `GET /_worker/health` - Health check endpoint
/// - anything else - Intercepted fetch
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/_worker/message", post(message_handler))
        .route("/_worker/sync", post(sync_handler))
        .route(
            "/_worker/progress",
            post(append_progress_handler).get(list_progress_handler),
        )
        .route("/_worker/push", post(push_handler))
        .route(
            "/_worker/notifications/:id/click",
            post(notification_click_handler),
        )
        .route("/_worker/stats", get(stats_handler))
        .route("/_worker/health", get(health_handler))
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
