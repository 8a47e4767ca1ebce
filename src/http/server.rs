//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request id, tracing, body limit)
//! - Serve on an already bound listener until shutdown

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::bridge::{BridgeEndpoint, SessionStateCell};
use crate::cache::ReferenceCache;
use crate::config::CacheConfig;
use crate::http::handlers::{self, SiteUser};
use crate::http::request::{request_span, with_request_id};
use crate::records::RecordSubmitter;

/// What /status reports about one upstream session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub location: String,
    pub primary: bool,
    pub state: SessionStateCell,
}

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub bridge: Arc<BridgeEndpoint>,
    pub records: RecordSubmitter,
    pub cache: ReferenceCache,
    pub cache_config: CacheConfig,
    pub users: Arc<Vec<SiteUser>>,
    pub sessions: Arc<Vec<SessionEntry>>,
}

/// HTTP server for the control surface.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, max_body_size: usize) -> Self {
        Self {
            router: Self::build_router(state, max_body_size),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, max_body_size: usize) -> Router {
        let router = Router::new()
            // Routes match on path only; the method is ignored.
            .route("/server_request", any(handlers::fetch_command))
            .route("/server_response", any(handlers::submit_answer))
            .route("/send_cv", any(handlers::send_cv))
            .route("/set_cached_reference", any(handlers::set_cached_reference))
            .route("/set_short_cached_reference", any(handlers::set_short_cached_reference))
            .route("/get_cached_reference", any(handlers::get_cached_reference))
            .route("/users", any(handlers::list_users))
            .route("/status", any(handlers::status))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(TraceLayer::new_for_http().make_span_with(request_span));

        with_request_id(router)
    }

    /// The router, for driving requests without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Control surface listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Control surface stopped");
        Ok(())
    }
}
