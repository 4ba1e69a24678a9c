//! HTTP surface over the cache engine.
//!
//! A thin axum layer: handlers translate query parameters and headers into
//! engine calls and stream archives back; all cache semantics live in
//! [`crate::storage`]. The janitor runs beside the server as an independent
//! tokio task.

pub mod handlers;

use crate::error::{QuarryError, QuarryResult};
use crate::storage::Storage;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    /// GitHub bearer token; blank means anonymous access.
    pub token: String,
    /// Namespace used when a request carries no user header.
    pub default_user: String,
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/v1/download", get(handlers::download))
        .route("/api/v1/download/commit", get(handlers::download_commit))
        .route("/api/v1/branch/switch", post(handlers::branch_switch))
        .route("/api/v1/package", get(handlers::package))
        .route(
            "/api/v1/files",
            get(handlers::list_files).delete(handlers::delete_files),
        )
        .route("/api/v1/files/touch", post(handlers::touch_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the API server until ctrl-c.
pub async fn serve(state: AppState, listen: &str) -> QuarryResult<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| QuarryError::io(format!("binding {listen}"), e))?;
    let addr = listener
        .local_addr()
        .map_err(|e| QuarryError::io("reading listen address", e))?;
    info!(%addr, "quarry listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| QuarryError::io("serving http", e))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

/// Run the retention sweep on a fixed interval, independent of requests.
///
/// The sweep itself is blocking filesystem work, so it runs on the blocking
/// pool; a failed sweep is logged and the loop keeps going.
pub fn spawn_janitor(
    storage: Arc<Storage>,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let storage = storage.clone();
            match tokio::task::spawn_blocking(move || storage.cleanup_expired(retention)).await {
                Ok(Ok(evicted)) => debug!(evicted, "janitor sweep complete"),
                Ok(Err(err)) => warn!(error = %err, "janitor sweep failed"),
                Err(err) => warn!(error = %err, "janitor task failed"),
            }
        }
    })
}
