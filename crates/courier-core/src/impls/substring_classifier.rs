//! SubstringClassifier - classify send errors by their message text.
//!
//! Transports like the WhatsApp web automation only report failures as
//! strings, so this is best-effort and sensitive to the transport's wording
//! and locale. An explicit `SendError::kind()` always wins.

use crate::domain::{FailureKind, SendError};
use crate::ports::FailureClassifier;
use crate::queue::default_blocked_markers;

#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    /// Lower-cased markers.
    markers: Vec<String>,
}

impl SubstringClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new(default_blocked_markers())
    }
}

impl FailureClassifier for SubstringClassifier {
    fn classify(&self, error: &SendError) -> FailureKind {
        if let Some(kind) = error.kind() {
            return kind;
        }
        let message = error.message().to_lowercase();
        if self.markers.iter().any(|m| message.contains(m.as_str())) {
            FailureKind::Blocked
        } else {
            FailureKind::Transient
        }
    }
}
