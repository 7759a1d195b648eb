//! Offline Worker - caching and background sync for low-connectivity clients
//!
//! Runs the worker as a local HTTP daemon in front of the upstream origin.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_worker::api::{create_router, AppState};
use offline_worker::{spawn_connectivity_monitor, Config, Worker};

/// Main entry point for the offline worker.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the database and build the worker over its stored caches
/// 4. Install and activate (precache the shell, or resume the stored one)
/// 5. Start the connectivity monitor
/// 6. Serve the control surface and intercepted fetches
/// 7. On SIGINT/SIGTERM stop serving and drain in-flight worker tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_worker=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Offline Worker");

    let config = Config::from_env();
    info!(
        "Configuration loaded: upstream={}, caches={}, port={}, connectivity_interval={}s",
        config.upstream_origin,
        config.current_cache_names().join(","),
        config.server_port,
        config.connectivity_interval
    );

    let worker = Worker::from_config(config.clone())
        .await
        .context("failed to initialise worker")?;
    let worker = Arc::new(worker);

    // Fails only when there is no shell to serve, fetched or stored.
    worker.start().await.context("worker install failed")?;

    let monitor_handle = spawn_connectivity_monitor(worker.clone(), config.connectivity_interval);
    info!("Connectivity monitor started");

    let app = create_router(AppState::new(worker.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor_handle))
        .await
        .context("server error")?;

    worker.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the connectivity monitor and allows graceful shutdown.
async fn shutdown_signal(monitor_handle: JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    monitor_handle.abort();
    warn!("Connectivity monitor aborted");
}
