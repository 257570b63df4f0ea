//! HTTP surface: the search and chat routes behind a request logger.

use std::sync::Arc;

use axum::{Router, middleware, routing::post};

pub mod error;
pub mod query;
pub mod routes;
pub mod state;
mod trace;

use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/vectorSearch", post(routes::vector_search))
        .route("/api/chat", post(routes::chat))
        .layer(middleware::from_fn(trace::log_requests))
        .with_state(state)
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(why) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl-C handler: {why}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(why) => log::warn!("failed to install SIGTERM handler: {why}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    log::info!("shutdown signal received, draining connections");
}
