//! Transport bindings
//!
//! The pipeline talks to queues only through the `virta-core` transport
//! traits. This module hosts the bindings shipped with the engine; today
//! that is the in-memory queue used by tests and the demo runtime. A broker
//! binding implements the same three traits and drops in here.

mod memory;

pub use memory::{DeadLetteredMessage, InMemoryQueue};
