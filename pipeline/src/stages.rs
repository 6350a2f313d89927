//! The two concrete pipeline stages
//!
//! [`ValidateOrder`] consumes `OrderRequested` from the orders queue,
//! validates and prices it, and emits `OrderProcessed` downstream.
//! [`CompleteOrder`] consumes `OrderProcessed`, finalizes the order, and
//! records the business metrics. Both return [`StageOutcome`] and let the
//! runner settle the inbound delivery.

use crate::emit::OrderEmitter;
use crate::metrics::PipelineMetrics;
use crate::stage::{StageContext, StageOutcome, StageTransform};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use virta_core::{
    OrderCompleted, OrderProcessed, OrderRequested, OrderStatus, StageError,
};

/// Validation and pricing stage: `OrderRequested` → `OrderProcessed`.
pub struct ValidateOrder {
    emitter: Arc<OrderEmitter>,
    processed_by: String,
}

impl ValidateOrder {
    /// Create the validator, emitting to the processed queue.
    pub fn new(emitter: Arc<OrderEmitter>) -> Self {
        Self {
            emitter,
            processed_by: "virta-validator".to_string(),
        }
    }
}

#[async_trait]
impl StageTransform for ValidateOrder {
    type In = OrderRequested;

    fn name(&self) -> &'static str {
        "validate"
    }

    async fn apply(&self, order: OrderRequested, cx: &StageContext) -> StageOutcome {
        // Structural rules redelivery cannot fix: dead-letter, no retry.
        if order.quantity == 0 {
            warn!(order_id = %order.order_id, "rejecting order: zero quantity");
            return StageOutcome::DeadLetter(StageError::InvalidMessage(
                "quantity must be positive".to_string(),
            ));
        }
        if order.unit_price <= 0.0 {
            warn!(
                order_id = %order.order_id,
                unit_price = order.unit_price,
                "rejecting order: non-positive unit price"
            );
            return StageOutcome::DeadLetter(StageError::InvalidMessage(
                "unit price must be positive".to_string(),
            ));
        }

        let processed = OrderProcessed {
            order_id: order.order_id,
            total_amount: order.quantity as f64 * order.unit_price,
            requested_at: order.created_at,
            processed_at: Utc::now(),
            processed_by: self.processed_by.clone(),
            correlation_id: order.correlation_id.clone(),
            status: OrderStatus::Validated,
        };

        match self
            .emitter
            .emit(&processed, &processed.correlation_id, Some(&cx.span))
            .await
        {
            Ok(_) => {
                info!(
                    order_id = %order.order_id,
                    total_amount = processed.total_amount,
                    "order validated"
                );
                StageOutcome::Complete
            }
            Err(e) => StageOutcome::Retry(e),
        }
    }
}

/// Terminal stage: `OrderProcessed` → `OrderCompleted`.
///
/// Records the order-level business metrics. An archive emitter is
/// optional; without one, completion is recorded and the payload's journey
/// ends here.
pub struct CompleteOrder {
    metrics: Arc<PipelineMetrics>,
    archive: Option<Arc<OrderEmitter>>,
}

impl CompleteOrder {
    /// Create the finalizer without an archive destination.
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            metrics,
            archive: None,
        }
    }

    /// Also emit the terminal `OrderCompleted` payload to an archive queue.
    pub fn with_archive(mut self, emitter: Arc<OrderEmitter>) -> Self {
        self.archive = Some(emitter);
        self
    }
}

#[async_trait]
impl StageTransform for CompleteOrder {
    type In = OrderProcessed;

    fn name(&self) -> &'static str {
        "complete"
    }

    async fn apply(&self, processed: OrderProcessed, cx: &StageContext) -> StageOutcome {
        let completed_at = Utc::now();
        let total_ms = (completed_at - processed.requested_at).num_milliseconds();

        let completed = OrderCompleted {
            order_id: processed.order_id,
            total_amount: processed.total_amount,
            completed_at,
            final_status: OrderStatus::Completed,
            correlation_id: processed.correlation_id.clone(),
            total_processing_time_ms: total_ms,
        };

        if let Some(archive) = &self.archive {
            if let Err(e) = archive
                .emit(&completed, &completed.correlation_id, Some(&cx.span))
                .await
            {
                return StageOutcome::Retry(e);
            }
        }

        let end_to_end = (completed_at - processed.requested_at)
            .to_std()
            .unwrap_or_default();
        self.metrics
            .record_order_completed(completed.total_amount, end_to_end);

        info!(
            order_id = %completed.order_id,
            total_amount = completed.total_amount,
            total_processing_time_ms = total_ms,
            "order completed"
        );
        StageOutcome::Complete
    }
}
