//! Reserved envelope property key constants
//!
//! Properties are the out-of-band channel of an envelope: everything the
//! transport carries alongside the payload without interpreting it. These
//! keys are reserved by convention so that trace context and dead-letter
//! diagnostics survive any transport that preserves string properties.

/// W3C-style trace context, the sole cross-process trace-propagation channel.
pub const TRACEPARENT: &str = "traceparent";

/// Opaque vendor trace state, carried only when non-empty.
pub const TRACESTATE: &str = "tracestate";

/// Why a message was dead-lettered, set at settlement time.
pub const DEADLETTER_REASON: &str = "deadletter.reason";
