//! Item and scheduler state machines.

use serde::{Deserialize, Serialize};

/// Delivery status of one queue item.
///
/// State transitions:
/// - Pending -> Sending -> Sent -> Delivered
/// - Pending -> Sending -> Failed -> Sending (while attempts < max_attempts)
/// - Pending -> Sending -> Blocked
///
/// `Delivered` and `Blocked` are terminal. `Failed` becomes terminal once the
/// attempt budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for its first attempt.
    Pending,

    /// Handed to the sender; the result is outstanding.
    Sending,

    /// Accepted by the sender, delivery not yet confirmed.
    Sent,

    /// Delivery confirmed.
    Delivered,

    /// Last attempt failed transiently.
    Failed,

    /// Recipient rejected permanently (invalid or blocked number).
    Blocked,
}

impl ItemStatus {
    /// Can this item be dispatched, given the attempts it already made?
    pub fn is_eligible(self, attempts: u32, max_attempts: u32) -> bool {
        match self {
            ItemStatus::Pending => true,
            ItemStatus::Failed => attempts < max_attempts,
            _ => false,
        }
    }

    /// Did the sender accept the message?
    pub fn is_success(self) -> bool {
        matches!(self, ItemStatus::Sent | ItemStatus::Delivered)
    }
}

/// Lifecycle of a scheduler.
///
/// `Idle -> Running <-> Paused`, then one of the terminal states:
/// `Stopped` (via stop), `Completed` (no eligible items left) or
/// `LimitReached` (daily quota hit mid-run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
    LimitReached,
}

impl SchedulerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SchedulerState::Stopped | SchedulerState::Completed | SchedulerState::LimitReached
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ItemStatus::Pending, 0, true)]
    #[case(ItemStatus::Failed, 1, true)]
    #[case(ItemStatus::Failed, 3, false)]
    #[case(ItemStatus::Blocked, 1, false)]
    #[case(ItemStatus::Sending, 1, false)]
    #[case(ItemStatus::Sent, 1, false)]
    #[case(ItemStatus::Delivered, 1, false)]
    fn eligibility(#[case] status: ItemStatus, #[case] attempts: u32, #[case] expected: bool) {
        assert_eq!(status.is_eligible(attempts, 3), expected);
    }

    #[test]
    fn statuses_serialize_in_snake_case() {
        let s = serde_json::to_string(&ItemStatus::Delivered).unwrap();
        assert_eq!(s, "\"delivered\"");
        let s = serde_json::to_string(&SchedulerState::LimitReached).unwrap();
        assert_eq!(s, "\"limit_reached\"");
    }

    #[test]
    fn only_end_states_are_terminal() {
        assert!(!SchedulerState::Idle.is_terminal());
        assert!(!SchedulerState::Paused.is_terminal());
        assert!(SchedulerState::Stopped.is_terminal());
        assert!(SchedulerState::Completed.is_terminal());
    }
}
