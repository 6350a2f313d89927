//! Convenience re-exports for building on the runtime
//!
//! ```ignore
//! use virta_runtime::prelude::*;
//! ```

pub use crate::{run, RuntimeBuilder};
pub use virta_core::{
    CorrelationId, MessageEnvelope, OrderCompleted, OrderProcessed, OrderRequested, OrderStatus,
    TraceContext,
};
pub use virta_pipeline::{
    CompleteOrder, Config, InMemoryQueue, LogFormat, OrderEmitter, PipelineMetrics, StageRunner,
    ValidateOrder,
};
