//! Prometheus metrics for the pipeline
//!
//! [`PipelineMetrics`] owns its own `Registry` and is passed explicitly to
//! every stage runner, emitter, and HTTP handler - there is no process-wide
//! singleton. Recording never fails: unknown tag values are accepted
//! verbatim, counters only increase, histograms accept unordered samples.

use crate::error::{PipelineError, Result};
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// All pipeline metrics, keyed by queue name (and error kind for failures).
pub struct PipelineMetrics {
    registry: Registry,

    // ─────────────────────────────────────────────────────────────────────────
    // Message counters
    // ─────────────────────────────────────────────────────────────────────────
    /// Envelopes sent (by destination queue)
    messages_sent: CounterVec,

    /// Deliveries received (by queue)
    messages_received: CounterVec,

    /// Deliveries completed (by queue)
    messages_processed: CounterVec,

    /// Deliveries failed (by queue, error kind)
    messages_failed: CounterVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Hop timing
    // ─────────────────────────────────────────────────────────────────────────
    /// Time from receipt to settlement (by queue)
    processing_duration: HistogramVec,

    /// Time a payload waited between hops (by queue)
    message_latency: HistogramVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Order-level business metrics
    // ─────────────────────────────────────────────────────────────────────────
    /// Orders accepted at HTTP ingress
    orders_created: Counter,

    /// Orders finalized by the terminal stage
    orders_completed: Counter,

    /// Monetary value of completed orders
    order_total_value: Histogram,

    /// Wall time from order creation to completion
    order_end_to_end: Histogram,
}

impl PipelineMetrics {
    /// Build a fresh metrics instance with its own registry.
    ///
    /// Returns an error only if metric registration fails, which means a
    /// name collision inside this registry and is a programming error.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let messages_sent = CounterVec::new(
            Opts::new("virta_messages_sent_total", "Total envelopes sent"),
            &["queue"],
        )
        .map_err(|e| PipelineError::Metrics(format!("messages_sent: {e}")))?;
        registry
            .register(Box::new(messages_sent.clone()))
            .map_err(|e| PipelineError::Metrics(format!("messages_sent: {e}")))?;

        let messages_received = CounterVec::new(
            Opts::new("virta_messages_received_total", "Total deliveries received"),
            &["queue"],
        )
        .map_err(|e| PipelineError::Metrics(format!("messages_received: {e}")))?;
        registry
            .register(Box::new(messages_received.clone()))
            .map_err(|e| PipelineError::Metrics(format!("messages_received: {e}")))?;

        let messages_processed = CounterVec::new(
            Opts::new(
                "virta_messages_processed_total",
                "Total deliveries completed successfully",
            ),
            &["queue"],
        )
        .map_err(|e| PipelineError::Metrics(format!("messages_processed: {e}")))?;
        registry
            .register(Box::new(messages_processed.clone()))
            .map_err(|e| PipelineError::Metrics(format!("messages_processed: {e}")))?;

        let messages_failed = CounterVec::new(
            Opts::new("virta_messages_failed_total", "Total deliveries failed"),
            &["queue", "kind"],
        )
        .map_err(|e| PipelineError::Metrics(format!("messages_failed: {e}")))?;
        registry
            .register(Box::new(messages_failed.clone()))
            .map_err(|e| PipelineError::Metrics(format!("messages_failed: {e}")))?;

        let processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "virta_message_processing_duration_seconds",
                "Time from receipt to settlement",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0,
            ]),
            &["queue"],
        )
        .map_err(|e| PipelineError::Metrics(format!("processing_duration: {e}")))?;
        registry
            .register(Box::new(processing_duration.clone()))
            .map_err(|e| PipelineError::Metrics(format!("processing_duration: {e}")))?;

        let message_latency = HistogramVec::new(
            HistogramOpts::new(
                "virta_message_latency_seconds",
                "Time a payload waited between hops",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0,
            ]),
            &["queue"],
        )
        .map_err(|e| PipelineError::Metrics(format!("message_latency: {e}")))?;
        registry
            .register(Box::new(message_latency.clone()))
            .map_err(|e| PipelineError::Metrics(format!("message_latency: {e}")))?;

        let orders_created = Counter::new(
            "virta_orders_created_total",
            "Orders accepted at HTTP ingress",
        )
        .map_err(|e| PipelineError::Metrics(format!("orders_created: {e}")))?;
        registry
            .register(Box::new(orders_created.clone()))
            .map_err(|e| PipelineError::Metrics(format!("orders_created: {e}")))?;

        let orders_completed = Counter::new(
            "virta_orders_completed_total",
            "Orders finalized by the terminal stage",
        )
        .map_err(|e| PipelineError::Metrics(format!("orders_completed: {e}")))?;
        registry
            .register(Box::new(orders_completed.clone()))
            .map_err(|e| PipelineError::Metrics(format!("orders_completed: {e}")))?;

        let order_total_value = Histogram::with_opts(
            HistogramOpts::new("virta_order_total_value", "Monetary value of completed orders")
                .buckets(vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]),
        )
        .map_err(|e| PipelineError::Metrics(format!("order_total_value: {e}")))?;
        registry
            .register(Box::new(order_total_value.clone()))
            .map_err(|e| PipelineError::Metrics(format!("order_total_value: {e}")))?;

        let order_end_to_end = Histogram::with_opts(
            HistogramOpts::new(
                "virta_order_end_to_end_duration_seconds",
                "Wall time from order creation to completion",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        )
        .map_err(|e| PipelineError::Metrics(format!("order_end_to_end: {e}")))?;
        registry
            .register(Box::new(order_end_to_end.clone()))
            .map_err(|e| PipelineError::Metrics(format!("order_end_to_end: {e}")))?;

        Ok(Self {
            registry,
            messages_sent,
            messages_received,
            messages_processed,
            messages_failed,
            processing_duration,
            message_latency,
            orders_created,
            orders_completed,
            order_total_value,
            order_end_to_end,
        })
    }

    /// Record an envelope sent to a destination queue.
    pub fn record_sent(&self, queue: &str) {
        self.messages_sent.with_label_values(&[queue]).inc();
    }

    /// Record a delivery received from a queue.
    pub fn record_received(&self, queue: &str) {
        self.messages_received.with_label_values(&[queue]).inc();
    }

    /// Record a successfully completed delivery and its handling duration.
    pub fn record_processed(&self, queue: &str, duration: Duration) {
        self.messages_processed.with_label_values(&[queue]).inc();
        self.processing_duration
            .with_label_values(&[queue])
            .observe(duration.as_secs_f64());
    }

    /// Record a failed delivery, tagged with the error kind.
    pub fn record_failed(&self, queue: &str, error_kind: &str) {
        self.messages_failed
            .with_label_values(&[queue, error_kind])
            .inc();
    }

    /// Record how long a payload waited between hops.
    pub fn record_latency(&self, queue: &str, latency: Duration) {
        self.message_latency
            .with_label_values(&[queue])
            .observe(latency.as_secs_f64());
    }

    /// Record an order accepted at HTTP ingress.
    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    /// Record a finalized order: its value and end-to-end duration.
    pub fn record_order_completed(&self, total_value: f64, end_to_end: Duration) {
        self.orders_completed.inc();
        self.order_total_value.observe(total_value);
        self.order_end_to_end.observe(end_to_end.as_secs_f64());
    }

    /// Gather all metrics and encode as Prometheus text format.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&families, &mut buffer).is_ok() {
            String::from_utf8(buffer).unwrap_or_default()
        } else {
            String::new()
        }
    }
}
