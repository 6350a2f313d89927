//! HTTP intake - the pipeline's entry edge
//!
//! `POST /orders` accepts an order, mints the root trace context and the
//! correlation id derived from its trace id, emits `OrderRequested` to the
//! orders queue, and responds `202 Accepted` with the ids the caller can
//! use to follow the order. Intake does no validation beyond shape; the
//! validator stage owns the business rules.

use crate::emit::OrderEmitter;
use crate::metrics::PipelineMetrics;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;
use virta_core::{CorrelationId, OrderRequested, TraceContext};

/// Shared state for the intake handlers.
#[derive(Clone)]
pub struct IntakeState {
    emitter: Arc<OrderEmitter>,
    metrics: Arc<PipelineMetrics>,
}

impl IntakeState {
    /// Create the intake state over the orders-queue emitter.
    pub fn new(emitter: Arc<OrderEmitter>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { emitter, metrics }
    }
}

/// Build the intake router.
pub fn router(state: IntakeState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/health", get(health))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    product_name: String,
    quantity: u32,
    unit_price: f64,
    customer_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    order_id: Uuid,
    status: &'static str,
    correlation_id: CorrelationId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    correlation_id: CorrelationId,
}

async fn create_order(
    State(state): State<IntakeState>,
    Json(request): Json<CreateOrderRequest>,
) -> impl IntoResponse {
    let root = TraceContext::new_root();
    let correlation_id = CorrelationId::from_trace(&root);
    let order_id = Uuid::new_v4();

    let span = info_span!(
        "create_order",
        order_id = %order_id,
        trace_id = %root.trace_id_hex(),
        span_id = %root.span_id_hex(),
        correlation_id = %correlation_id,
    );

    async move {
        let order = OrderRequested {
            order_id,
            product_name: request.product_name,
            quantity: request.quantity,
            unit_price: request.unit_price,
            customer_email: request.customer_email,
            created_at: Utc::now(),
            correlation_id: correlation_id.clone(),
        };

        match state.emitter.emit(&order, &correlation_id, Some(&root)).await {
            Ok(_) => {
                state.metrics.record_order_created();
                info!(product_name = %order.product_name, "order accepted");
                (
                    StatusCode::ACCEPTED,
                    Json(CreateOrderResponse {
                        order_id,
                        status: "Accepted",
                        correlation_id,
                    }),
                )
                    .into_response()
            }
            Err(e) => {
                error!(error = %e, "failed to enqueue order");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "failed to enqueue order".to_string(),
                        correlation_id,
                    }),
                )
                    .into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "Healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use tower::ServiceExt;
    use virta_core::{property_keys, MessageEnvelope, QueueSender, StageError};

    struct CaptureSender {
        sent: Mutex<Vec<MessageEnvelope>>,
    }

    #[async_trait]
    impl QueueSender for CaptureSender {
        fn destination(&self) -> &str {
            "orders"
        }

        async fn send(&self, envelope: MessageEnvelope) -> Result<(), StageError> {
            self.sent.lock().push(envelope);
            Ok(())
        }
    }

    struct RejectingSender;

    #[async_trait]
    impl QueueSender for RejectingSender {
        fn destination(&self) -> &str {
            "orders"
        }

        async fn send(&self, _envelope: MessageEnvelope) -> Result<(), StageError> {
            Err(StageError::SendFailed("broker down".into()))
        }
    }

    fn app(sender: Arc<dyn QueueSender>) -> (Router, Arc<PipelineMetrics>) {
        let metrics = Arc::new(PipelineMetrics::new().unwrap());
        let emitter = Arc::new(OrderEmitter::new(sender, Arc::clone(&metrics)));
        (
            router(IntakeState::new(emitter, Arc::clone(&metrics))),
            metrics,
        )
    }

    fn order_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/orders")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "productName": "Widget",
                    "quantity": 5,
                    "unitPrice": 29.99,
                    "customerEmail": "a@b.com",
                })
                .to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn post_orders_returns_accepted_with_ids() {
        let sender = Arc::new(CaptureSender {
            sent: Mutex::new(Vec::new()),
        });
        let (app, metrics) = app(sender.clone());

        let response = app.oneshot(order_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "Accepted");
        let correlation = json["correlationId"].as_str().unwrap();
        assert_eq!(correlation.len(), 32);

        // The enqueued payload carries the same ids the caller received.
        let sent = sender.sent.lock();
        let order: OrderRequested = serde_json::from_slice(&sent[0].body).unwrap();
        assert_eq!(order.order_id.to_string(), json["orderId"].as_str().unwrap());
        assert_eq!(order.correlation_id.as_ref(), correlation);
        assert!(metrics.gather().contains("virta_orders_created_total 1"));
    }

    #[tokio::test]
    async fn enqueued_envelope_traceparent_matches_correlation() {
        let sender = Arc::new(CaptureSender {
            sent: Mutex::new(Vec::new()),
        });
        let (app, _) = app(sender.clone());

        app.oneshot(order_request()).await.unwrap();

        let sent = sender.sent.lock();
        let traceparent = sent[0].property(property_keys::TRACEPARENT).unwrap();
        let ctx = TraceContext::decode(traceparent).unwrap();
        // Correlation id is the 32-hex trace id: downstream logs and the
        // caller's handle join on the same value.
        assert_eq!(ctx.trace_id_hex(), sent[0].correlation_id.as_ref());
    }

    #[tokio::test]
    async fn enqueue_failure_returns_server_error() {
        let (app, metrics) = app(Arc::new(RejectingSender));

        let response = app.oneshot(order_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["correlationId"].as_str().unwrap().len() == 32);
        assert!(!metrics.gather().contains("virta_orders_created_total 1"));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let sender = Arc::new(CaptureSender {
            sent: Mutex::new(Vec::new()),
        });
        let (app, _) = app(sender.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/orders")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"quantity": "five"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(sender.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn health_endpoints_report_healthy() {
        let sender = Arc::new(CaptureSender {
            sent: Mutex::new(Vec::new()),
        });
        let (app, _) = app(sender);

        for uri in ["/health", "/orders/health"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["status"], "Healthy");
        }
    }
}
