//! virta-core - Core types for the VIRTA order pipeline
//!
//! This crate provides the foundational types shared between the pipeline
//! engine and any transport binding:
//!
//! - [`TraceContext`] + traceparent codec - cross-process trace propagation
//! - [`CorrelationId`] - the business-level correlation carrier
//! - [`MessageEnvelope`] - the wire envelope crossing queue boundaries
//! - [`OrderRequested`] / [`OrderProcessed`] / [`OrderCompleted`] - the
//!   domain payload chain
//! - [`QueueSender`] / [`QueueReceiver`] / [`Delivery`] - the transport seam
//! - [`StageError`] - the stage error taxonomy
//!
//! # Why this crate exists
//!
//! Transport bindings need the envelope and settlement traits, and the
//! pipeline engine needs the transport traits. Keeping both here means a
//! broker binding depends on `virta-core` alone, never on the engine.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

/// Business-level correlation carrier
pub mod correlation;
/// The wire envelope crossing queue boundaries
pub mod envelope;
mod error;
/// The domain payload chain
pub mod order;
/// Reserved envelope property key constants
pub mod property_keys;
/// Queue transport traits
pub mod queue;
/// Trace context and the traceparent codec
pub mod trace;

pub use correlation::CorrelationId;
pub use envelope::{MessageEnvelope, MessageId, Properties, CONTENT_TYPE_JSON};
pub use error::StageError;
pub use order::{OrderCompleted, OrderPayload, OrderProcessed, OrderRequested, OrderStatus};
pub use queue::{Delivery, QueueReceiver, QueueSender};
pub use trace::{DecodeError, TraceContext};
