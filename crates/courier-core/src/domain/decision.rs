//! Decision model: what to do with an item after a failed send.
//!
//! The scheduler asks a `Decider` and then applies the answer; the decider
//! itself never touches queue state.

use std::sync::Arc;
use std::time::Duration;

use super::errors::{FailureKind, SendError};
use super::item::QueueItem;
use crate::ports::FailureClassifier;
use crate::queue::DispatchPolicy;

/// The next action for an item whose send just failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Leave the item `failed` and retry it after `delay`.
    Retry { delay: Duration, reason: String },

    /// Leave the item `failed` for good; the attempt budget is spent.
    GiveUp { reason: String },

    /// Mark the item `blocked`; never retried.
    Block { reason: String },
}

/// Decides the follow-up for a failed send.
///
/// Deciders are pure: same item and error, same decision.
pub trait Decider: Send + Sync {
    /// `item.attempts` already counts the attempt that just failed.
    fn decide(&self, item: &QueueItem, error: &SendError) -> Decision;
}

/// Fixed-backoff decider used by default.
///
/// - Blocked (per the classifier) -> Block
/// - Transient with budget left -> Retry after `retry_backoff`
/// - Transient with budget spent -> GiveUp
pub struct DefaultDecider {
    classifier: Arc<dyn FailureClassifier>,
    retry_backoff: Duration,
    max_attempts: u32,
}

impl DefaultDecider {
    pub fn new(
        classifier: Arc<dyn FailureClassifier>,
        retry_backoff: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            classifier,
            retry_backoff,
            max_attempts,
        }
    }

    pub fn from_policy(policy: &DispatchPolicy, classifier: Arc<dyn FailureClassifier>) -> Self {
        Self::new(classifier, policy.retry_backoff(), policy.max_attempts)
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, item: &QueueItem, error: &SendError) -> Decision {
        match self.classifier.classify(error) {
            FailureKind::Blocked => Decision::Block {
                reason: format!("recipient rejected: {}", error.message()),
            },
            FailureKind::Transient if item.attempts >= self.max_attempts => Decision::GiveUp {
                reason: format!(
                    "max attempts reached: {}/{}",
                    item.attempts, self.max_attempts
                ),
            },
            FailureKind::Transient => Decision::Retry {
                delay: self.retry_backoff,
                reason: format!(
                    "retry attempt {}/{} after {:?}",
                    item.attempts + 1,
                    self.max_attempts,
                    self.retry_backoff
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, Recipient};
    use crate::impls::SubstringClassifier;
    use chrono::Utc;
    use ulid::Ulid;

    fn decider() -> DefaultDecider {
        DefaultDecider::new(
            Arc::new(SubstringClassifier::default()),
            Duration::from_secs(30),
            3,
        )
    }

    fn item_with_attempts(attempts: u32) -> QueueItem {
        let mut item = QueueItem::new(
            ItemId::from_ulid(Ulid::new()),
            Recipient::new("Ana", "123"),
            "hi".into(),
            Utc::now(),
        );
        item.attempts = attempts;
        item
    }

    #[test]
    fn transient_failure_is_retried_with_fixed_backoff() {
        let d = decider();
        for attempts in [1, 2] {
            let decision = d.decide(&item_with_attempts(attempts), &SendError::new("timeout"));
            assert!(matches!(
                decision,
                Decision::Retry { delay, .. } if delay == Duration::from_secs(30)
            ));
        }
    }

    #[test]
    fn spent_budget_gives_up() {
        let decision = decider().decide(&item_with_attempts(3), &SendError::new("timeout"));
        assert!(matches!(decision, Decision::GiveUp { reason } if reason.contains("3/3")));
    }

    #[test]
    fn blocked_wins_over_budget() {
        let decision = decider().decide(&item_with_attempts(1), &SendError::new("Number blocked"));
        assert!(matches!(decision, Decision::Block { .. }));
    }
}
