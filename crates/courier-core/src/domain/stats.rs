use serde::{Deserialize, Serialize};

use super::item::QueueItem;
use super::status::ItemStatus;

/// Aggregate item counts, the host-facing view of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub sending: usize,
    pub sent: usize,
    pub delivered: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl QueueStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>) -> Self {
        let mut stats = QueueStats::default();
        for item in items {
            stats.total += 1;
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Sending => stats.sending += 1,
                ItemStatus::Sent => stats.sent += 1,
                ItemStatus::Delivered => stats.delivered += 1,
                ItemStatus::Failed => stats.failed += 1,
                ItemStatus::Blocked => stats.blocked += 1,
            }
        }
        stats
    }

    /// Items the sender accepted, confirmed or not.
    pub fn succeeded(&self) -> usize {
        self.sent + self.delivered
    }
}
