//! Error taxonomy for pipeline stages

use thiserror::Error;

/// Error type for stage processing and emission.
///
/// Every failure of a hop settles into one of three categories, and the
/// category decides the settlement: an invalid message dead-letters (it
/// cannot self-heal), a failed send or transform leaves the delivery
/// unacknowledged so the transport redelivers it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Payload cannot be parsed into the stage's input type, or violates
    /// a structural rule that redelivery cannot fix. Terminal.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The transport rejected a downstream send (timeout, auth, quota).
    /// Retryable via transport redelivery of the inbound delivery.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Business logic failed unexpectedly. Retryable up to the transport's
    /// max delivery count, after which the transport dead-letters.
    #[error("transform failed: {0}")]
    TransformFailed(String),
}

impl StageError {
    /// Label used for the failed-counter `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::InvalidMessage(_) => "deserialize",
            StageError::SendFailed(_) => "send",
            StageError::TransformFailed(_) => "transform",
        }
    }

    /// Whether redelivery can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StageError::InvalidMessage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        assert_eq!(
            StageError::InvalidMessage("missing orderId".into()).to_string(),
            "invalid message: missing orderId"
        );
        assert_eq!(
            StageError::SendFailed("timeout".into()).to_string(),
            "send failed: timeout"
        );
        assert_eq!(
            StageError::TransformFailed("oops".into()).to_string(),
            "transform failed: oops"
        );
    }

    #[test]
    fn kinds_match_metric_labels() {
        assert_eq!(StageError::InvalidMessage(String::new()).kind(), "deserialize");
        assert_eq!(StageError::SendFailed(String::new()).kind(), "send");
        assert_eq!(StageError::TransformFailed(String::new()).kind(), "transform");
    }

    #[test]
    fn only_invalid_message_is_terminal() {
        assert!(!StageError::InvalidMessage(String::new()).is_retryable());
        assert!(StageError::SendFailed(String::new()).is_retryable());
        assert!(StageError::TransformFailed(String::new()).is_retryable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StageError>();
    }
}
