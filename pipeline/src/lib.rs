//! virta-pipeline - The order pipeline engine
//!
//! Wires the pieces of a three-stage asynchronous order pipeline:
//!
//! ```text
//! POST /orders ──► [orders queue] ──► validate ──► [processed queue] ──► complete
//! ```
//!
//! - [`http`] - HTTP intake: accepts orders, mints the root trace context
//! - [`emit::OrderEmitter`] - builds and sends outbound envelopes
//! - [`stage::StageRunner`] - the per-hop receive/process/settle loop
//! - [`stages`] - the validator and finalizer transforms
//! - [`transport`] - queue bindings (in-memory today)
//! - [`metrics`] - Prometheus metrics, injected, no global registry
//! - [`config`] - environment-driven runtime configuration
//!
//! Trace context crosses every queue hop via the `traceparent` envelope
//! property, so one trace spans the whole journey of an order.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod emit;
pub mod error;
pub mod http;
pub mod metrics;
pub mod metrics_server;
pub mod stage;
pub mod stages;
pub mod transport;

pub use config::{Config, LogFormat};
pub use emit::OrderEmitter;
pub use error::{PipelineError, Result, StageError};
pub use http::IntakeState;
pub use metrics::PipelineMetrics;
pub use metrics_server::MetricsServer;
pub use stage::{Settlement, StageContext, StageOutcome, StageRunner, StageTransform};
pub use stages::{CompleteOrder, ValidateOrder};
pub use transport::InMemoryQueue;
