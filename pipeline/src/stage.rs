//! Pipeline stage runner - the per-hop state machine
//!
//! Each asynchronous hop executes the same state machine per inbound unit
//! of work:
//!
//! ```text
//! Received ──► ContextExtracted ──► SpanActive ──► { Completed | Retried | DeadLettered }
//! ```
//!
//! 1. Read `traceparent` from the envelope; a missing, malformed, or
//!    zero-id context degrades to a root span, never an error.
//! 2. Mint the processing span context (child of the extracted parent) and
//!    open a tracing span carrying messaging attributes and the
//!    correlation id.
//! 3. Deserialize the body. Malformed payloads cannot self-heal: they
//!    dead-letter immediately, with no retry.
//! 4. Run the stage's transform, which returns an explicit
//!    [`StageOutcome`] - settlement is a value, not an exception.
//! 5. Settle exactly once: complete, abandon (transport redelivery), or
//!    dead-letter. Each path records its counter and closes the span.
//!
//! Concurrency per stage is bounded by a semaphore; shutdown stops the
//! receive loop and drains in-flight handlers before returning.

use crate::error::Result;
use crate::metrics::PipelineMetrics;
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};
use virta_core::{CorrelationId, Delivery, OrderPayload, QueueReceiver, StageError, TraceContext};

/// Disposition of one unit of work, decided by the stage transform.
///
/// The runner applies the corresponding transport action; transforms never
/// touch settlement themselves.
#[derive(Debug)]
pub enum StageOutcome {
    /// Work done (including any downstream emit): acknowledge.
    Complete,
    /// Transient failure: leave unacknowledged for transport redelivery.
    Retry(StageError),
    /// Unrecoverable: route to the dead-letter path.
    DeadLetter(StageError),
}

/// Final settlement applied to a delivery. Returned for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Acknowledged.
    Completed,
    /// Left for redelivery.
    Retried,
    /// Terminally parked.
    DeadLettered,
}

/// Ambient state a transform may need: the active span context for
/// downstream emission, the correlation id, and the delivery count.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// The processing span's trace context. Emit downstream with this so
    /// the next hop links to the current span.
    pub span: TraceContext,
    /// The payload's correlation id (authoritative over the envelope's).
    pub correlation_id: CorrelationId,
    /// Delivery attempt number, starting at 1.
    pub delivery_count: u32,
}

/// The business transform one stage applies.
///
/// Implementations deserialize nothing and settle nothing: they receive the
/// typed payload and return a [`StageOutcome`]. Emitting to the next hop
/// (via an [`OrderEmitter`](crate::emit::OrderEmitter) the transform owns)
/// happens inside `apply`, and an emit failure maps to
/// `StageOutcome::Retry` so the inbound delivery is redelivered.
#[async_trait]
pub trait StageTransform: Send + Sync {
    /// The payload type this stage consumes.
    type In: OrderPayload + DeserializeOwned + Send;

    /// Short stage name for logging.
    fn name(&self) -> &'static str;

    /// Apply the transform to one payload.
    async fn apply(&self, input: Self::In, cx: &StageContext) -> StageOutcome;
}

#[async_trait]
impl<T: StageTransform + ?Sized> StageTransform for Arc<T> {
    type In = T::In;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn apply(&self, input: Self::In, cx: &StageContext) -> StageOutcome {
        (**self).apply(input, cx).await
    }
}

/// Long-lived worker loop for one queue.
pub struct StageRunner<T: StageTransform> {
    receiver: Arc<dyn QueueReceiver>,
    transform: Arc<T>,
    metrics: Arc<PipelineMetrics>,
    max_concurrent: usize,
    shutdown: watch::Receiver<bool>,
}

impl<T: StageTransform + 'static> StageRunner<T> {
    /// Create a runner. `max_concurrent` bounds the in-flight worker slots.
    pub fn new(
        receiver: Arc<dyn QueueReceiver>,
        transform: T,
        metrics: Arc<PipelineMetrics>,
        max_concurrent: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            receiver,
            transform: Arc::new(transform),
            metrics,
            max_concurrent: max_concurrent.max(1),
            shutdown,
        }
    }

    /// Run until the queue closes or shutdown is signalled.
    ///
    /// On shutdown the loop stops accepting new deliveries, in-flight
    /// handlers finish their settlement, and only then does this return.
    pub async fn run(self) -> Result<()> {
        let queue = self.receiver.queue_name().to_string();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut shutdown = self.shutdown.clone();

        info!(
            queue = %queue,
            stage = self.transform.name(),
            max_concurrent = self.max_concurrent,
            "stage runner started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // A permit is held before receiving, so at most max_concurrent
            // deliveries are in flight at once.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };

            let delivery = tokio::select! {
                changed = shutdown.changed() => {
                    drop(permit);
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                received = self.receiver.receive() => match received {
                    Some(d) => d,
                    None => {
                        drop(permit);
                        debug!(queue = %queue, "queue closed");
                        break;
                    }
                },
            };

            let transform = Arc::clone(&self.transform);
            let metrics = Arc::clone(&self.metrics);
            let queue = queue.clone();
            tokio::spawn(async move {
                let _permit = permit;
                process_delivery(&queue, transform.as_ref(), metrics.as_ref(), delivery).await;
            });
        }

        // Drain: wait for every in-flight handler to settle its delivery.
        let _ = semaphore.acquire_many(self.max_concurrent as u32).await;
        info!(queue = %queue, stage = self.transform.name(), "stage runner drained");
        Ok(())
    }
}

/// Handle one delivery end to end and settle it exactly once.
pub(crate) async fn process_delivery<T: StageTransform>(
    queue: &str,
    transform: &T,
    metrics: &PipelineMetrics,
    delivery: Box<dyn Delivery>,
) -> Settlement {
    metrics.record_received(queue);

    let envelope = delivery.envelope().clone();
    let parent = envelope.extract_trace();
    let span_ctx = parent
        .as_ref()
        .map(TraceContext::child)
        .unwrap_or_else(TraceContext::new_root);

    let parent_span_id = parent
        .as_ref()
        .map(|p| p.span_id_hex())
        .unwrap_or_default();
    let span = info_span!(
        "process",
        messaging.system = "virta",
        messaging.destination = %queue,
        messaging.operation = "process",
        messaging.message_id = %envelope.message_id,
        trace_id = %span_ctx.trace_id_hex(),
        span_id = %span_ctx.span_id_hex(),
        parent_span_id = %parent_span_id,
        correlation_id = %envelope.correlation_id,
    );

    async move {
        let started = Instant::now();

        let outcome = match serde_json::from_slice::<T::In>(&envelope.body) {
            Err(e) => {
                warn!(error = %e, "payload deserialize failed");
                StageOutcome::DeadLetter(StageError::InvalidMessage(e.to_string()))
            }
            Ok(input) => {
                let latency = (Utc::now() - input.occurred_at())
                    .to_std()
                    .unwrap_or_default();
                metrics.record_latency(queue, latency);

                if input.correlation_id() != &envelope.correlation_id {
                    warn!(
                        payload_correlation_id = %input.correlation_id(),
                        "envelope correlation id differs from payload; payload wins"
                    );
                }

                let cx = StageContext {
                    span: span_ctx.clone(),
                    correlation_id: input.correlation_id().clone(),
                    delivery_count: delivery.delivery_count(),
                };
                debug!(order_id = %input.order_id(), stage = transform.name(), "transform start");
                transform.apply(input, &cx).await
            }
        };

        match outcome {
            StageOutcome::Complete => {
                if let Err(e) = delivery.complete().await {
                    error!(error = %e, "failed to complete delivery; transport will redeliver");
                    return Settlement::Retried;
                }
                metrics.record_processed(queue, started.elapsed());
                debug!(duration_ms = started.elapsed().as_millis() as u64, "completed");
                Settlement::Completed
            }
            StageOutcome::Retry(e) => {
                metrics.record_failed(queue, e.kind());
                error!(error = %e, kind = e.kind(), "stage failed, leaving for redelivery");
                if let Err(settle_err) = delivery.abandon().await {
                    error!(error = %settle_err, "failed to abandon delivery");
                }
                Settlement::Retried
            }
            StageOutcome::DeadLetter(e) => {
                metrics.record_failed(queue, e.kind());
                error!(error = %e, kind = e.kind(), "stage failed terminally, dead-lettering");
                let reason = e.to_string();
                if let Err(settle_err) = delivery.dead_letter(&reason).await {
                    error!(error = %settle_err, "failed to dead-letter delivery");
                }
                Settlement::DeadLettered
            }
        }
    }
    .instrument(span)
    .await
}
