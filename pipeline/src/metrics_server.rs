//! HTTP server for Prometheus metrics
//!
//! Runs a lightweight HTTP server on a separate port for Prometheus
//! scraping.
//!
//! # Endpoints
//!
//! - `GET /metrics` - Prometheus metrics in text exposition format
//! - `GET /health` - Simple health check
//!
//! # Example
//!
//! ```ignore
//! use virta_pipeline::metrics_server::MetricsServer;
//!
//! let handle = MetricsServer::start(9090, metrics);
//! ```

use crate::metrics::PipelineMetrics;
use axum::extract::State;
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared state for the metrics server
#[derive(Clone)]
struct AppState {
    metrics: Arc<PipelineMetrics>,
}

/// Metrics HTTP server
pub struct MetricsServer;

impl MetricsServer {
    /// Start the metrics server on the given port
    ///
    /// Returns a JoinHandle that can be used to abort the server.
    /// The server runs until aborted or the process exits.
    pub fn start(port: u16, metrics: Arc<PipelineMetrics>) -> JoinHandle<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let state = AppState { metrics };

        tokio::spawn(async move {
            let app = Self::router(state);

            info!(port = port, "Metrics server starting");

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, port = port, "Failed to bind metrics server");
                    return;
                }
            };

            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Metrics server error");
            }
        })
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }
}

/// Handler for /metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.gather();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Handler for /health endpoint
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
