//! HTTP API
//!
//! Thin axum layer over the job queue: request validation and upload
//! handling live here, everything else is delegated to [`QueueManager`].

mod error;
mod handlers;

pub use error::ApiError;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::core::artifacts::LocalArtifactStore;
use crate::core::queue::QueueManager;
use crate::core::voice::SynthesisClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Allow any origin, method and header
    pub cors_permissive: bool,
    /// Longest accepted input text, in characters
    pub max_text_chars: usize,
    /// Largest accepted request body (all uploads together)
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_permissive: true,
            max_text_chars: 50_000,
            max_request_bytes: 200 * 1024 * 1024,
        }
    }
}

/// Shared handler state
pub struct AppState {
    pub queue: QueueManager,
    pub store: Arc<LocalArtifactStore>,
    pub client: Arc<dyn SynthesisClient>,
    pub config: ServerConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        queue: QueueManager,
        store: Arc<LocalArtifactStore>,
        client: Arc<dyn SynthesisClient>,
        config: ServerConfig,
    ) -> Self {
        Self {
            queue,
            store,
            client,
            config,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_permissive = state.config.cors_permissive;
    let body_limit = state.config.max_request_bytes;

    let app = Router::new()
        .route("/v1/voice-clone", post(handlers::submit_job))
        .route("/v1/jobs", get(handlers::list_jobs))
        .route(
            "/v1/jobs/:job_id",
            get(handlers::job_status).delete(handlers::cancel_job),
        )
        .route("/v1/jobs/:job_id/download", get(handlers::download))
        .route("/v1/voices", get(handlers::list_voices))
        .route("/v1/voices/cleanup", post(handlers::cleanup_voices))
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/queue/stats", get(handlers::queue_stats))
        .route("/health", get(handlers::health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    if cors_permissive {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    } else {
        app
    }
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = state.config.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("voxclone API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
