//! W3C-style trace context and the traceparent codec
//!
//! A [`TraceContext`] identifies one span within one distributed trace.
//! The codec renders it as the flat `traceparent` string that crosses
//! process boundaries inside envelope properties:
//!
//! ```text
//! 00-{trace_id: 32 hex}-{span_id: 16 hex}-{01|00}
//! ```
//!
//! Decoding never panics on external input: every violation of the format
//! yields [`DecodeError::Malformed`], and the caller degrades to a root
//! span instead of propagating a partially-decoded parent.

use thiserror::Error;

/// Error returned when a `traceparent` string cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The string violates the traceparent format.
    #[error("malformed traceparent: {0}")]
    Malformed(&'static str),
}

/// Trace context for propagation between pipeline hops.
///
/// Immutable once constructed. A context is either minted locally
/// ([`new_root`](Self::new_root), [`child`](Self::child)) or reconstructed
/// from an inbound envelope via [`decode`](Self::decode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// The 128-bit trace ID, shared by every span in the trace.
    pub trace_id: u128,

    /// The 64-bit span ID of the current span.
    pub span_id: u64,

    /// Sampling decision carried in the traceparent flags field.
    pub sampled: bool,

    /// Opaque vendor state. Not part of the traceparent string; it travels
    /// in its own `tracestate` envelope property.
    pub trace_state: Option<String>,
}

impl TraceContext {
    /// Mint a new root context with random trace and span ids.
    pub fn new_root() -> Self {
        Self {
            trace_id: rand::random(),
            span_id: rand::random(),
            sampled: true,
            trace_state: None,
        }
    }

    /// Derive a child context: same trace, fresh span id.
    ///
    /// The sampling decision and trace state are inherited from the parent.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: rand::random(),
            sampled: self.sampled,
            trace_state: self.trace_state.clone(),
        }
    }

    /// Attach opaque `tracestate` content.
    pub fn with_trace_state(mut self, state: impl Into<String>) -> Self {
        self.trace_state = Some(state.into());
        self
    }

    /// Whether this context may serve as the parent of a new span.
    ///
    /// The codec accepts all-zero trace or span ids (no special-casing on
    /// decode), but linking a span to id zero produces orphans in every
    /// tracing backend, so callers treat such a context as "no parent".
    pub fn is_valid_parent(&self) -> bool {
        self.trace_id != 0 && self.span_id != 0
    }

    /// The trace id as 32 lowercase hex characters.
    pub fn trace_id_hex(&self) -> String {
        format!("{:032x}", self.trace_id)
    }

    /// The span id as 16 lowercase hex characters.
    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    /// Encode as a traceparent string, version field fixed at `00`.
    pub fn encode(&self) -> String {
        format!(
            "00-{:032x}-{:016x}-{}",
            self.trace_id,
            self.span_id,
            if self.sampled { "01" } else { "00" }
        )
    }

    /// Decode a traceparent string.
    ///
    /// Validates: exactly 4 hyphen-delimited fields, a 2-hex-char version,
    /// 32 hex chars of trace id, 16 hex chars of span id, and a flags field
    /// that is exactly `00` or `01`. The decoded context has no
    /// `trace_state`; the caller attaches it from the separate property.
    pub fn decode(s: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = s.split('-').collect();
        if fields.len() != 4 {
            return Err(DecodeError::Malformed("expected 4 hyphen-delimited fields"));
        }

        let trace_id = parse_hex_u128(fields[1], 32, "trace id must be 32 hex chars")?;
        let span_id = parse_hex_u64(fields[2], 16, "span id must be 16 hex chars")?;

        if fields[0].len() != 2 || !is_hex(fields[0]) {
            return Err(DecodeError::Malformed("version must be 2 hex chars"));
        }

        let sampled = match fields[3] {
            "01" => true,
            "00" => false,
            _ => return Err(DecodeError::Malformed("flags must be 00 or 01")),
        };

        Ok(Self {
            trace_id,
            span_id,
            sampled,
            trace_state: None,
        })
    }
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_hex_u128(s: &str, len: usize, msg: &'static str) -> Result<u128, DecodeError> {
    if s.len() != len || !is_hex(s) {
        return Err(DecodeError::Malformed(msg));
    }
    u128::from_str_radix(s, 16).map_err(|_| DecodeError::Malformed(msg))
}

fn parse_hex_u64(s: &str, len: usize, msg: &'static str) -> Result<u64, DecodeError> {
    if s.len() != len || !is_hex(s) {
        return Err(DecodeError::Malformed(msg));
    }
    u64::from_str_radix(s, 16).map_err(|_| DecodeError::Malformed(msg))
}
