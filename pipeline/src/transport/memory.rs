//! In-memory queue with lock/lease settlement semantics
//!
//! Models the delivery contract of a real broker closely enough to exercise
//! every settlement path: FIFO ready list, per-message delivery counts,
//! abandon-for-redelivery with a max delivery count, and a dead-letter
//! holding area that records the reason and time of each parked message.
//!
//! Cloning the queue clones a handle to the same shared state, so one
//! instance serves as both the sender and receiver side of a hop.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, warn};
use virta_core::{property_keys, Delivery, MessageEnvelope, QueueReceiver, QueueSender, StageError};

/// A message parked in the dead-letter holding area.
#[derive(Debug, Clone)]
pub struct DeadLetteredMessage {
    /// The envelope as last delivered.
    pub envelope: MessageEnvelope,
    /// Why it was parked.
    pub reason: String,
    /// When it was parked.
    pub failed_at: Instant,
}

struct PendingDelivery {
    envelope: MessageEnvelope,
    /// Completed delivery attempts so far (0 for a fresh message).
    delivery_count: u32,
}

struct Shared {
    name: String,
    max_delivery_count: u32,
    ready: Mutex<VecDeque<PendingDelivery>>,
    notify: Notify,
    dead: Mutex<Vec<DeadLetteredMessage>>,
    closed: AtomicBool,
}

/// In-memory at-least-once queue.
#[derive(Clone)]
pub struct InMemoryQueue {
    shared: Arc<Shared>,
}

impl InMemoryQueue {
    /// Create a queue. `max_delivery_count` bounds redelivery: once a
    /// message has been delivered that many times, the next abandon parks
    /// it in the dead-letter area instead of requeueing.
    pub fn new(name: impl Into<String>, max_delivery_count: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                max_delivery_count: max_delivery_count.max(1),
                ready: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                dead: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Messages currently ready for delivery.
    pub fn len(&self) -> usize {
        self.shared.ready.lock().len()
    }

    /// Whether the ready list is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.ready.lock().is_empty()
    }

    /// Snapshot of the dead-letter holding area.
    pub fn dead_letters(&self) -> Vec<DeadLetteredMessage> {
        self.shared.dead.lock().clone()
    }

    /// Close the queue: sends start failing and receivers drain what is
    /// already ready, then observe end-of-stream.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }
}

#[async_trait]
impl QueueSender for InMemoryQueue {
    fn destination(&self) -> &str {
        &self.shared.name
    }

    async fn send(&self, envelope: MessageEnvelope) -> Result<(), StageError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(StageError::SendFailed(format!(
                "queue '{}' is closed",
                self.shared.name
            )));
        }
        self.shared.ready.lock().push_back(PendingDelivery {
            envelope,
            delivery_count: 0,
        });
        self.shared.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl QueueReceiver for InMemoryQueue {
    fn queue_name(&self) -> &str {
        &self.shared.name
    }

    async fn receive(&self) -> Option<Box<dyn Delivery>> {
        loop {
            // Arm the notification before checking the list, so a send that
            // lands between the check and the await still wakes us.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(pending) = self.shared.ready.lock().pop_front() {
                return Some(Box::new(MemoryDelivery {
                    envelope: pending.envelope,
                    delivery_count: pending.delivery_count + 1,
                    shared: Arc::clone(&self.shared),
                }));
            }

            if self.shared.closed.load(Ordering::SeqCst) {
                return None;
            }

            notified.await;
        }
    }
}

struct MemoryDelivery {
    envelope: MessageEnvelope,
    delivery_count: u32,
    shared: Arc<Shared>,
}

#[async_trait]
impl Delivery for MemoryDelivery {
    fn envelope(&self) -> &MessageEnvelope {
        &self.envelope
    }

    fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    async fn complete(self: Box<Self>) -> Result<(), StageError> {
        debug!(
            queue = %self.shared.name,
            message_id = %self.envelope.message_id,
            "delivery completed"
        );
        Ok(())
    }

    async fn abandon(self: Box<Self>) -> Result<(), StageError> {
        if self.delivery_count >= self.shared.max_delivery_count {
            warn!(
                queue = %self.shared.name,
                message_id = %self.envelope.message_id,
                delivery_count = self.delivery_count,
                "max delivery count exceeded, dead-lettering"
            );
            park(&self.shared, self.envelope, "max delivery count exceeded");
            return Ok(());
        }
        self.shared.ready.lock().push_back(PendingDelivery {
            envelope: self.envelope,
            delivery_count: self.delivery_count,
        });
        self.shared.notify.notify_one();
        Ok(())
    }

    async fn dead_letter(self: Box<Self>, reason: &str) -> Result<(), StageError> {
        warn!(
            queue = %self.shared.name,
            message_id = %self.envelope.message_id,
            reason,
            "delivery dead-lettered"
        );
        park(&self.shared, self.envelope, reason);
        Ok(())
    }
}

/// Park an envelope in the dead-letter area, stamping the reason into its
/// property map the way a broker surfaces it alongside the message.
fn park(shared: &Shared, mut envelope: MessageEnvelope, reason: &str) {
    envelope
        .properties_mut()
        .insert(property_keys::DEADLETTER_REASON.to_string(), reason.to_string());
    shared.dead.lock().push(DeadLetteredMessage {
        envelope,
        reason: reason.to_string(),
        failed_at: Instant::now(),
    });
}
