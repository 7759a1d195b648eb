//! API Module
//!
//! HTTP handlers and routing for the worker's control surface and the
//! intercepted-fetch fallback.
//!
//! # Endpoints
//! - `POST /_worker/message` - Page→worker message
//! - `POST /_worker/sync` - Fire a sync event
//! - `POST|GET /_worker/progress` - Queue or list progress records
//! - `POST /_worker/push` - Push payload
//! - `POST /_worker/notifications/:id/click` - Notification click
//! - `GET /_worker/stats` - Worker statistics
//! - `GET /_worker/health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
