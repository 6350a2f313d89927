//! The wire envelope that crosses queue boundaries
//!
//! A [`MessageEnvelope`] combines the payload bytes, the transport-native
//! correlation field, and an out-of-band property map. The property map is
//! where trace context travels; the payload is never inspected for it.
//!
//! Envelopes use `Bytes` for the body so that cloning one (e.g. for a
//! dead-letter store) only bumps a refcount, and properties are lazily
//! allocated since most envelopes carry exactly two keys or none.

use crate::correlation::CorrelationId;
use crate::property_keys;
use crate::trace::TraceContext;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Content type for JSON-encoded domain payloads.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Property storage. Lazily allocated; `None` when empty.
pub type Properties = Option<Box<HashMap<String, String>>>;

fn properties_ref(p: &Properties) -> &HashMap<String, String> {
    static EMPTY: std::sync::OnceLock<HashMap<String, String>> = std::sync::OnceLock::new();
    p.as_ref()
        .map(|b| b.as_ref())
        .unwrap_or_else(|| EMPTY.get_or_init(HashMap::new))
}

/// Unique transport message identifier (ULID), fresh per send.
///
/// Never reused: re-emitting a payload always mints a new id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(ulid::Ulid);

impl MessageId {
    /// Generate a new unique id.
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The wire representation of one unit of work.
///
/// Created at send time, read-only after receipt. One envelope maps to
/// exactly one domain payload instance.
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    /// Unique per send.
    pub message_id: MessageId,

    /// Mirrors the payload's correlation id for transport-native filtering.
    pub correlation_id: CorrelationId,

    /// Body encoding, `application/json` for the order payload chain.
    pub content_type: String,

    /// Out-of-band string properties (`traceparent`, `tracestate`, ...).
    pub properties: Properties,

    /// The JSON-encoded domain payload.
    pub body: Bytes,
}

impl MessageEnvelope {
    /// Create an envelope with a fresh message id.
    pub fn new(content_type: impl Into<String>, correlation_id: CorrelationId, body: Bytes) -> Self {
        Self {
            message_id: MessageId::new(),
            correlation_id,
            content_type: content_type.into(),
            properties: None,
            body,
        }
    }

    /// Create a JSON envelope, the pipeline's canonical form.
    pub fn json(correlation_id: CorrelationId, body: Bytes) -> Self {
        Self::new(CONTENT_TYPE_JSON, correlation_id, body)
    }

    /// Add a property (builder style).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties_mut().insert(key.into(), value.into());
        self
    }

    /// Property map reference (empty map if none allocated).
    #[inline]
    pub fn properties(&self) -> &HashMap<String, String> {
        properties_ref(&self.properties)
    }

    /// Mutable property map, allocating if needed.
    #[inline]
    pub fn properties_mut(&mut self) -> &mut HashMap<String, String> {
        self.properties
            .get_or_insert_with(|| Box::new(HashMap::new()))
    }

    /// Look up a single property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties().get(key).map(String::as_str)
    }

    /// Inject a trace context into the property map.
    ///
    /// Writes `traceparent` always and `tracestate` only when non-empty,
    /// so every emitted envelope carries a syntactically valid encoded
    /// context whenever a span is active at emission time.
    pub fn inject_trace(&mut self, ctx: &TraceContext) {
        let props = self.properties_mut();
        props.insert(property_keys::TRACEPARENT.to_string(), ctx.encode());
        match &ctx.trace_state {
            Some(state) if !state.is_empty() => {
                props.insert(property_keys::TRACESTATE.to_string(), state.clone());
            }
            _ => {}
        }
    }

    /// Extract the trace context carried by this envelope, if any.
    ///
    /// Returns `None` for a missing or malformed `traceparent`, and for
    /// all-zero trace/span ids (the codec accepts them; this seam rejects
    /// them as a parent). `tracestate` is attached when present.
    pub fn extract_trace(&self) -> Option<TraceContext> {
        let raw = self.property(property_keys::TRACEPARENT)?;
        let ctx = TraceContext::decode(raw).ok()?;
        if !ctx.is_valid_parent() {
            return None;
        }
        match self.property(property_keys::TRACESTATE) {
            Some(state) => Some(ctx.with_trace_state(state)),
            None => Some(ctx),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn envelope() -> MessageEnvelope {
        MessageEnvelope::json(CorrelationId::from("corr-1"), Bytes::from_static(b"{}"))
    }

    #[test]
    fn new_envelope_has_fresh_id_and_no_properties() {
        let a = envelope();
        let b = envelope();
        assert_ne!(a.message_id, b.message_id);
        assert!(a.properties.is_none());
        assert!(a.properties().is_empty());
        assert_eq!(a.content_type, CONTENT_TYPE_JSON);
    }

    #[test]
    fn with_property_allocates_lazily() {
        let env = envelope().with_property("tenant", "acme");
        assert_eq!(env.property("tenant"), Some("acme"));
        assert_eq!(env.property("missing"), None);
    }

    #[test]
    fn inject_then_extract_round_trips() {
        let ctx = TraceContext::new_root();
        let mut env = envelope();
        env.inject_trace(&ctx);

        assert_eq!(
            env.property(property_keys::TRACEPARENT),
            Some(ctx.encode().as_str())
        );
        assert_eq!(env.extract_trace().unwrap(), ctx);
    }

    #[test]
    fn inject_carries_non_empty_trace_state() {
        let ctx = TraceContext::new_root().with_trace_state("vendor=abc");
        let mut env = envelope();
        env.inject_trace(&ctx);

        assert_eq!(env.property(property_keys::TRACESTATE), Some("vendor=abc"));
        let extracted = env.extract_trace().unwrap();
        assert_eq!(extracted.trace_state.as_deref(), Some("vendor=abc"));
    }

    #[test]
    fn inject_skips_empty_trace_state() {
        let ctx = TraceContext::new_root().with_trace_state("");
        let mut env = envelope();
        env.inject_trace(&ctx);
        assert_eq!(env.property(property_keys::TRACESTATE), None);
    }

    #[test]
    fn extract_missing_traceparent_is_none() {
        assert!(envelope().extract_trace().is_none());
    }

    #[test]
    fn extract_malformed_traceparent_is_none() {
        let env = envelope().with_property(property_keys::TRACEPARENT, "not-a-traceparent");
        assert!(env.extract_trace().is_none());
    }

    #[test]
    fn extract_zero_ids_is_none() {
        let zeros = format!("00-{}-{}-01", "0".repeat(32), "0".repeat(16));
        let env = envelope().with_property(property_keys::TRACEPARENT, zeros);
        assert!(env.extract_trace().is_none());
    }

    #[test]
    fn clone_shares_body_allocation() {
        let body = Bytes::from(vec![7u8; 4096]);
        let env = MessageEnvelope::json(CorrelationId::from("c"), body.clone());
        let cloned = env.clone();
        assert_eq!(cloned.body.as_ptr(), env.body.as_ptr());
    }
}
