//! Run the full order pipeline with defaults.
//!
//! ```sh
//! cargo run --example order_pipeline
//! curl -s -X POST localhost:8080/orders \
//!   -H 'content-type: application/json' \
//!   -d '{"productName":"Widget","quantity":5,"unitPrice":29.99,"customerEmail":"a@b.com"}'
//! ```

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    virta_runtime::run().await
}
