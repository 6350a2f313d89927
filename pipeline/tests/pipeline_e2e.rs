//! Full pipeline: HTTP intake → validate → complete
//!
//! Stands up both stage runners over in-memory queues, posts an order
//! through the real router, and follows it to the archived
//! `OrderCompleted` payload, asserting the chain invariants: one order id,
//! one correlation id, one trace id, correct pricing.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;
use virta_core::{OrderCompleted, OrderStatus, QueueReceiver, TraceContext};
use virta_pipeline::{
    CompleteOrder, InMemoryQueue, IntakeState, OrderEmitter, PipelineMetrics, StageRunner,
    ValidateOrder,
};

struct Harness {
    app: axum::Router,
    orders: InMemoryQueue,
    processed: InMemoryQueue,
    completed: InMemoryQueue,
    metrics: Arc<PipelineMetrics>,
    shutdown_tx: watch::Sender<bool>,
    runners: Vec<tokio::task::JoinHandle<()>>,
}

fn harness() -> Harness {
    let metrics = Arc::new(PipelineMetrics::new().expect("metrics"));
    let orders = InMemoryQueue::new("orders", 5);
    let processed = InMemoryQueue::new("orders-processed", 5);
    let completed = InMemoryQueue::new("orders-completed", 5);

    let intake_emitter = Arc::new(OrderEmitter::new(
        Arc::new(orders.clone()),
        Arc::clone(&metrics),
    ));
    let app = virta_pipeline::http::router(IntakeState::new(
        intake_emitter,
        Arc::clone(&metrics),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let validator = StageRunner::new(
        Arc::new(orders.clone()),
        ValidateOrder::new(Arc::new(OrderEmitter::new(
            Arc::new(processed.clone()),
            Arc::clone(&metrics),
        ))),
        Arc::clone(&metrics),
        4,
        shutdown_rx.clone(),
    );
    let finalizer = StageRunner::new(
        Arc::new(processed.clone()),
        CompleteOrder::new(Arc::clone(&metrics)).with_archive(Arc::new(OrderEmitter::new(
            Arc::new(completed.clone()),
            Arc::clone(&metrics),
        ))),
        Arc::clone(&metrics),
        4,
        shutdown_rx,
    );

    let runners = vec![
        tokio::spawn(async move {
            let _ = validator.run().await;
        }),
        tokio::spawn(async move {
            let _ = finalizer.run().await;
        }),
    ];

    Harness {
        app,
        orders,
        processed,
        completed,
        metrics,
        shutdown_tx,
        runners,
    }
}

impl Harness {
    async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        self.orders.close();
        self.processed.close();
        for handle in self.runners {
            handle.await.expect("runner");
        }
    }
}

fn post_order(quantity: u32, unit_price: f64) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "productName": "Widget",
                "quantity": quantity,
                "unitPrice": unit_price,
                "customerEmail": "a@b.com",
            })
            .to_string(),
        ))
        .expect("request")
}

async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[tokio::test]
async fn order_flows_through_both_stages_with_stable_identity() {
    let harness = harness();

    let response = harness
        .app
        .clone()
        .oneshot(post_order(5, 29.99))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = response.into_body().collect().await.expect("body").to_bytes();
    let accepted: serde_json::Value = serde_json::from_slice(&body).expect("json");
    let order_id = accepted["orderId"].as_str().expect("orderId").to_string();
    let correlation = accepted["correlationId"]
        .as_str()
        .expect("correlationId")
        .to_string();

    // The terminal payload lands in the archive queue.
    assert!(wait_until(|| !harness.completed.is_empty()).await);
    let delivery = harness.completed.receive().await.expect("delivery");
    let completed: OrderCompleted =
        serde_json::from_slice(&delivery.envelope().body).expect("payload");

    assert_eq!(completed.order_id.to_string(), order_id);
    assert_eq!(completed.correlation_id.as_ref(), correlation);
    assert_eq!(completed.total_amount, 5.0 * 29.99);
    assert_eq!(completed.final_status, OrderStatus::Completed);
    assert!(completed.total_processing_time_ms >= 0);

    // The archived envelope's trace is the same trace the caller's
    // correlation id names: one trace across the whole journey.
    let traceparent = delivery
        .envelope()
        .property(virta_core::property_keys::TRACEPARENT)
        .expect("traceparent");
    let ctx = TraceContext::decode(traceparent).expect("decode");
    assert_eq!(ctx.trace_id_hex(), correlation);
    delivery.complete().await.expect("settle");

    assert!(harness.orders.dead_letters().is_empty());
    assert!(harness.processed.dead_letters().is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn invalid_order_dead_letters_at_the_validator() {
    let harness = harness();

    let response = harness
        .app
        .clone()
        .oneshot(post_order(0, 29.99))
        .await
        .expect("response");
    // Intake accepts shape-valid orders; business rules live downstream.
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    assert!(wait_until(|| !harness.orders.dead_letters().is_empty()).await);
    let dead = harness.orders.dead_letters();
    assert_eq!(dead.len(), 1);
    assert!(dead[0].reason.contains("quantity"));
    // Nothing reached the second hop.
    assert!(harness.processed.is_empty());
    assert!(harness.completed.is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn metrics_tell_the_story_of_one_order() {
    let harness = harness();

    harness
        .app
        .clone()
        .oneshot(post_order(2, 10.0))
        .await
        .expect("response");

    assert!(wait_until(|| !harness.completed.is_empty()).await);
    assert!(wait_until(|| {
        harness
            .metrics
            .gather()
            .contains("virta_messages_processed_total{queue=\"orders-processed\"} 1")
    })
    .await);

    let text = harness.metrics.gather();
    assert!(text.contains("virta_orders_created_total 1"));
    assert!(text.contains("virta_orders_completed_total 1"));
    // One send per hop: orders, orders-processed, orders-completed.
    assert!(text.contains("virta_messages_sent_total{queue=\"orders\"} 1"));
    assert!(text.contains("virta_messages_sent_total{queue=\"orders-processed\"} 1"));
    assert!(text.contains("virta_messages_sent_total{queue=\"orders-completed\"} 1"));
    assert!(text.contains("virta_messages_processed_total{queue=\"orders\"} 1"));

    harness.shutdown().await;
}

#[tokio::test]
async fn trace_ids_differ_between_orders() {
    let harness = harness();

    for _ in 0..2 {
        harness
            .app
            .clone()
            .oneshot(post_order(1, 5.0))
            .await
            .expect("response");
    }

    assert!(wait_until(|| harness.completed.len() == 2).await);
    let first = harness.completed.receive().await.expect("first");
    let second = harness.completed.receive().await.expect("second");
    let a: OrderCompleted = serde_json::from_slice(&first.envelope().body).expect("a");
    let b: OrderCompleted = serde_json::from_slice(&second.envelope().body).expect("b");
    assert_ne!(a.order_id, b.order_id);
    assert_ne!(a.correlation_id, b.correlation_id);
    first.complete().await.expect("settle");
    second.complete().await.expect("settle");

    harness.shutdown().await;
}
