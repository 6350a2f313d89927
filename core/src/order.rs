//! The order payload chain
//!
//! Each pipeline stage consumes the previous stage's payload type and
//! produces the next: [`OrderRequested`] → [`OrderProcessed`] →
//! [`OrderCompleted`]. `order_id` and `correlation_id` are invariant across
//! the chain; every downstream payload carries them bit-identical to the
//! payload that produced it.
//!
//! Payloads serialize as camelCase JSON, the pipeline's wire contract.

use crate::correlation::CorrelationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order status as it advances through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted at HTTP ingress, not yet validated.
    Accepted,
    /// Validated and priced by the first processing stage.
    Validated,
    /// Finalized by the terminal stage.
    Completed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Validated => "Validated",
            OrderStatus::Completed => "Completed",
        };
        f.write_str(s)
    }
}

/// Uniform access to the fields every payload in the chain carries.
///
/// The stage runner uses this to record hop latency and to log the
/// correlation id without knowing the concrete payload type.
pub trait OrderPayload {
    /// The order this payload belongs to, invariant across the chain.
    fn order_id(&self) -> Uuid;

    /// The correlation carrier, invariant across the chain.
    fn correlation_id(&self) -> &CorrelationId;

    /// When the producing hop created this payload. Hop latency is
    /// `now - occurred_at` measured at the consuming hop.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Payload emitted by HTTP intake into the orders queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequested {
    /// Minted at HTTP ingress, invariant across the chain
    pub order_id: Uuid,

    /// Free-form product name as submitted
    pub product_name: String,

    /// Units ordered; validated positive by the validator stage
    pub quantity: u32,

    /// Price per unit; validated positive by the validator stage
    pub unit_price: f64,

    /// Contact address as submitted
    pub customer_email: String,

    /// When intake accepted the order
    pub created_at: DateTime<Utc>,

    /// Chosen at ingress, invariant across the chain
    pub correlation_id: CorrelationId,
}

impl OrderPayload for OrderRequested {
    fn order_id(&self) -> Uuid {
        self.order_id
    }

    fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Payload emitted by the validator stage into the processed queue.
///
/// Carries `requested_at` forward so the terminal stage can compute the
/// end-to-end processing time without shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProcessed {
    /// Invariant across the chain
    pub order_id: Uuid,

    /// `quantity × unit_price`, computed once by the validator
    pub total_amount: f64,

    /// `OrderRequested.created_at`, carried forward
    pub requested_at: DateTime<Utc>,

    /// When the validator produced this payload
    pub processed_at: DateTime<Utc>,

    /// Name of the stage that produced this payload
    pub processed_by: String,

    /// Invariant across the chain
    pub correlation_id: CorrelationId,

    /// `Validated` when produced by the validator
    pub status: OrderStatus,
}

impl OrderPayload for OrderProcessed {
    fn order_id(&self) -> Uuid {
        self.order_id
    }

    fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.processed_at
    }
}

/// Terminal payload produced by the finalizer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCompleted {
    /// Invariant across the chain
    pub order_id: Uuid,

    /// Carried from `OrderProcessed`, never re-derived
    pub total_amount: f64,

    /// When the finalizer produced this payload
    pub completed_at: DateTime<Utc>,

    /// `Completed` on the happy path
    pub final_status: OrderStatus,

    /// Invariant across the chain
    pub correlation_id: CorrelationId,

    /// Wall time from order creation to completion, in milliseconds
    pub total_processing_time_ms: i64,
}

impl OrderPayload for OrderCompleted {
    fn order_id(&self) -> Uuid {
        self.order_id
    }

    fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn requested() -> OrderRequested {
        OrderRequested {
            order_id: Uuid::new_v4(),
            product_name: "Widget".to_string(),
            quantity: 5,
            unit_price: 29.99,
            customer_email: "a@b.com".to_string(),
            created_at: Utc::now(),
            correlation_id: CorrelationId::from("corr-1"),
        }
    }

    #[test]
    fn requested_serializes_camel_case() {
        let json = serde_json::to_string(&requested()).unwrap();
        for key in [
            "orderId",
            "productName",
            "quantity",
            "unitPrice",
            "customerEmail",
            "createdAt",
            "correlationId",
        ] {
            assert!(json.contains(key), "missing key {key} in {json}");
        }
    }

    #[test]
    fn requested_round_trips() {
        let order = requested();
        let json = serde_json::to_vec(&order).unwrap();
        let back: OrderRequested = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn completed_serializes_processing_time() {
        let done = OrderCompleted {
            order_id: Uuid::new_v4(),
            total_amount: 149.95,
            completed_at: Utc::now(),
            final_status: OrderStatus::Completed,
            correlation_id: CorrelationId::from("corr-1"),
            total_processing_time_ms: 42,
        };
        let json = serde_json::to_string(&done).unwrap();
        assert!(json.contains("totalProcessingTime"));
        assert!(json.contains("finalStatus"));
        assert!(json.contains("\"Completed\""));
    }

    #[test]
    fn payload_trait_exposes_chain_invariants() {
        let order = requested();
        let processed = OrderProcessed {
            order_id: order.order_id,
            total_amount: order.quantity as f64 * order.unit_price,
            requested_at: order.created_at,
            processed_at: Utc::now(),
            processed_by: "validator".to_string(),
            correlation_id: order.correlation_id.clone(),
            status: OrderStatus::Validated,
        };

        assert_eq!(processed.order_id(), order.order_id());
        assert_eq!(processed.correlation_id(), order.correlation_id());
    }

    #[test]
    fn missing_required_field_fails_deserialize() {
        let err = serde_json::from_str::<OrderRequested>(r#"{"orderId": "not-even-a-uuid"}"#);
        assert!(err.is_err());
    }
}
