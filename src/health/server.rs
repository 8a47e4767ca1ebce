//! Minimal health server.

use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub fn health_router() -> Router {
    Router::new().route("/", get(|| async { Json(true) }))
}

/// Serve `GET /` until `shutdown` fires.
pub async fn serve_health(
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Health server listening");

    axum::serve(listener, health_router())
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
