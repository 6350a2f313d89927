//! VIRTA Runtime — wire-and-run for the order pipeline
//!
//! Provides [`run()`] for zero-boilerplate pipeline startup, and
//! [`RuntimeBuilder`] for users who need control over addresses and queue
//! tuning.
//!
//! # Quick start
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     virta_runtime::run().await
//! }
//! ```
//!
//! The runtime stands up the whole topology: the HTTP intake server, the
//! metrics server, two in-memory queues, and a stage runner per queue
//! (validator, finalizer). On SIGINT or SIGTERM it stops intake, closes
//! the queues, and waits for both runners to drain before exiting.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use virta_pipeline::{
    CompleteOrder, Config, InMemoryQueue, IntakeState, LogFormat, MetricsServer, OrderEmitter,
    PipelineMetrics, StageRunner, ValidateOrder,
};

/// Run the order pipeline with configuration from environment variables.
///
/// Blocks until shutdown. See [`RuntimeBuilder`] for overrides.
pub async fn run() -> anyhow::Result<()> {
    RuntimeBuilder::new().serve().await
}

/// Builder for controlling runtime behaviour.
///
/// # Example
///
/// ```ignore
/// RuntimeBuilder::new()
///     .config(my_config)
///     .serve()
///     .await
/// ```
pub struct RuntimeBuilder {
    config: Option<Config>,
}

impl RuntimeBuilder {
    /// Create a builder that loads configuration from the environment.
    pub fn new() -> Self {
        Self { config: None }
    }

    /// Use an explicit configuration instead of the environment.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Wire the topology and run it to completion.
    ///
    /// This is the terminal method — it blocks until shutdown.
    pub async fn serve(self) -> anyhow::Result<()> {
        let config = match self.config {
            Some(c) => c,
            None => Config::from_env()?,
        };

        init_tracing(&config);

        info!(
            http_addr = %config.http_addr,
            metrics_addr = %config.metrics_addr,
            orders_queue = %config.orders_queue,
            processed_queue = %config.processed_queue,
            "Starting VIRTA"
        );

        let metrics = Arc::new(PipelineMetrics::new()?);
        let _metrics_handle = MetricsServer::start(config.metrics_addr.port(), Arc::clone(&metrics));
        info!(port = config.metrics_addr.port(), "Metrics server started");

        let orders = InMemoryQueue::new(&config.orders_queue, config.max_delivery_count);
        let processed = InMemoryQueue::new(&config.processed_queue, config.max_delivery_count);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let validator = StageRunner::new(
            Arc::new(orders.clone()),
            ValidateOrder::new(Arc::new(OrderEmitter::new(
                Arc::new(processed.clone()),
                Arc::clone(&metrics),
            ))),
            Arc::clone(&metrics),
            config.max_concurrent_calls,
            shutdown_rx.clone(),
        );
        let finalizer = StageRunner::new(
            Arc::new(processed.clone()),
            CompleteOrder::new(Arc::clone(&metrics)),
            Arc::clone(&metrics),
            config.max_concurrent_calls,
            shutdown_rx,
        );

        let validator_handle = tokio::spawn(async move {
            if let Err(e) = validator.run().await {
                tracing::error!(error = %e, "Validator runner error");
            }
        });
        let finalizer_handle = tokio::spawn(async move {
            if let Err(e) = finalizer.run().await {
                tracing::error!(error = %e, "Finalizer runner error");
            }
        });

        let intake_emitter = Arc::new(OrderEmitter::new(
            Arc::new(orders.clone()),
            Arc::clone(&metrics),
        ));
        let app = virta_pipeline::http::router(IntakeState::new(
            intake_emitter,
            Arc::clone(&metrics),
        ));

        info!(addr = %config.http_addr, "HTTP intake listening");
        let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        // Intake has stopped; stop the runners and drain.
        let _ = shutdown_tx.send(true);
        orders.close();
        processed.close();
        let _ = validator_handle.await;
        let _ = finalizer_handle.await;

        info!("VIRTA shutdown complete");
        Ok(())
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialise the tracing subscriber based on config.
fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
