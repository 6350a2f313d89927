//! Queue transport traits
//!
//! The queue is an external collaborator: an opaque at-least-once delivery
//! channel with lock/lease semantics. These traits are the seam the
//! pipeline talks through; any broker binding (or the in-memory transport
//! used in tests) implements them.
//!
//! # Settlement
//!
//! A received [`Delivery`] must be settled exactly once: completed,
//! abandoned for redelivery, or dead-lettered. The settlement methods
//! consume `Box<Self>`, so a double-complete or complete-after-abandon is
//! unrepresentable at the type level.

use crate::envelope::MessageEnvelope;
use crate::error::StageError;
use async_trait::async_trait;

/// Sends envelopes to one destination queue.
///
/// # Implementation Requirements
///
/// - Must be safe for concurrent use by all worker slots (`Send + Sync`).
/// - `send` must not retry internally; retry policy belongs to the
///   transport and the caller's settlement decision.
#[async_trait]
pub trait QueueSender: Send + Sync {
    /// The destination queue name, used for metric tags and logging.
    fn destination(&self) -> &str;

    /// Send one envelope.
    ///
    /// # Errors
    ///
    /// `StageError::SendFailed` when the transport rejects the send
    /// (timeout, auth, quota). The envelope is not partially delivered.
    async fn send(&self, envelope: MessageEnvelope) -> Result<(), StageError>;
}

/// One received unit of work, holding the transport's lock on the message.
#[async_trait]
pub trait Delivery: Send {
    /// The envelope as received. Read-only after receipt.
    fn envelope(&self) -> &MessageEnvelope;

    /// How many times this message has been delivered, starting at 1.
    fn delivery_count(&self) -> u32;

    /// Acknowledge: the unit of work is done and must not be redelivered.
    async fn complete(self: Box<Self>) -> Result<(), StageError>;

    /// Release the lock for redelivery. The transport's own max delivery
    /// count bounds how often this can recur before it dead-letters.
    async fn abandon(self: Box<Self>) -> Result<(), StageError>;

    /// Terminal placement into the dead-letter holding area.
    async fn dead_letter(self: Box<Self>, reason: &str) -> Result<(), StageError>;
}

/// Receives deliveries from one queue.
///
/// Each stage runner owns its receiver exclusively; concurrency happens
/// downstream of `receive`, in the worker slots.
#[async_trait]
pub trait QueueReceiver: Send + Sync {
    /// The queue name, used for span naming and metric tags.
    fn queue_name(&self) -> &str;

    /// Wait for the next delivery. `None` means the queue is closed and
    /// no further deliveries will arrive.
    async fn receive(&self) -> Option<Box<dyn Delivery>>;
}
