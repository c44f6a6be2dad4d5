//! FailureClassifier port - maps a send error to a failure kind.

use crate::domain::{FailureKind, SendError};

/// Decides whether a failed send is worth retrying.
///
/// Implementations should honor `SendError::kind()` when the sender set it.
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, error: &SendError) -> FailureKind;
}
