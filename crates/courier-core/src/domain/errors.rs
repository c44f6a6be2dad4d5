//! Error types and failure classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operational classification of a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network or availability problem; worth retrying.
    Transient,

    /// The recipient number is invalid or has blocked us; never retried.
    Blocked,
}

/// Error reported by a message sender.
///
/// Most transports only give us text, so the kind hint is optional and the
/// classifier falls back to matching the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SendError {
    message: String,
    kind: Option<FailureKind>,
}

impl SendError {
    /// Error known only by its message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    /// Error the sender already knows to be permanent.
    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: Some(FailureKind::Blocked),
        }
    }

    /// Error the sender already knows to be retryable.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: Some(FailureKind::Transient),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> Option<FailureKind> {
        self.kind
    }
}

/// Errors raised by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("counter store format: {0}")]
    Format(#[from] serde_json::Error),

    #[error("counter store lock poisoned")]
    Poisoned,
}

/// Errors surfaced to the host while building or driving a scheduler.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("recipient list is empty")]
    EmptyRecipients,

    #[error("invalid dispatch policy: {0}")]
    InvalidPolicy(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_error_displays_its_message() {
        let err = SendError::new("socket closed");
        assert_eq!(err.to_string(), "socket closed");
        assert_eq!(err.kind(), None);
        assert_eq!(SendError::blocked("x").kind(), Some(FailureKind::Blocked));
    }

    #[test]
    fn store_errors_convert_into_courier_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CourierError = StoreError::from(io).into();
        assert!(err.to_string().contains("denied"));
    }
}
