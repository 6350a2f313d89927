//! Producer emitter - builds and sends outbound envelopes
//!
//! The [`OrderEmitter`] is the only component that constructs envelopes for
//! a new hop. It serializes the payload to the canonical JSON form, mirrors
//! the correlation id into the transport field, mints a fresh message id,
//! and injects the active span's trace context into the property map.

use crate::metrics::PipelineMetrics;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};
use virta_core::{CorrelationId, MessageEnvelope, MessageId, QueueSender, StageError, TraceContext};

/// Emits order payloads to one destination queue.
pub struct OrderEmitter {
    sender: Arc<dyn QueueSender>,
    metrics: Arc<PipelineMetrics>,
}

impl OrderEmitter {
    /// Create an emitter over a transport sender.
    pub fn new(sender: Arc<dyn QueueSender>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { sender, metrics }
    }

    /// The destination queue name.
    pub fn destination(&self) -> &str {
        self.sender.destination()
    }

    /// Build and send an envelope for `payload`.
    ///
    /// When `span` is present its context is encoded into the envelope's
    /// `traceparent` (and `tracestate` if non-empty), so the next hop can
    /// parent its processing span to this one. Returns the fresh message id
    /// on success.
    ///
    /// # Errors
    ///
    /// `StageError::SendFailed` when the transport rejects the send. No
    /// internal retry: on a processing hop the caller must map this to an
    /// abandoned (redelivered) inbound delivery, never a silent drop.
    pub async fn emit<P: Serialize>(
        &self,
        payload: &P,
        correlation_id: &CorrelationId,
        span: Option<&TraceContext>,
    ) -> Result<MessageId, StageError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| StageError::TransformFailed(format!("serialize payload: {e}")))?;

        let mut envelope = MessageEnvelope::json(correlation_id.clone(), Bytes::from(body));
        if let Some(ctx) = span {
            envelope.inject_trace(ctx);
        }
        let message_id = envelope.message_id;

        self.sender.send(envelope).await.map_err(|e| {
            error!(
                destination = self.sender.destination(),
                correlation_id = %correlation_id,
                error = %e,
                "send failed"
            );
            e
        })?;

        self.metrics.record_sent(self.sender.destination());
        debug!(
            destination = self.sender.destination(),
            message_id = %message_id,
            correlation_id = %correlation_id,
            "envelope sent"
        );
        Ok(message_id)
    }
}
