//! Business-level correlation carrier
//!
//! A [`CorrelationId`] is the human-loggable identifier that ties every log
//! line and payload of one logical order together. It is deliberately
//! independent of span identity: spans are minted per hop and die with it,
//! the correlation id is chosen once at ingress and never mutated.

use crate::trace::TraceContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier for one logical order.
///
/// Chosen once: derived from the root trace id when a trace is active at
/// HTTP ingress, freshly generated (ULID) otherwise. Carried verbatim in
/// every downstream payload and mirrored into the transport correlation
/// field of every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Derive from an active trace: the 32-hex trace id.
    ///
    /// This makes log lines greppable straight into the trace backend.
    pub fn from_trace(ctx: &TraceContext) -> Self {
        Self(ctx.trace_id_hex())
    }

    /// Generate a fresh id when no trace is active.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Borrow the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
