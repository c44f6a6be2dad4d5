//! Queue item: one recipient, its rendered message, and its delivery state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ItemId;
use super::recipient::Recipient;
use super::status::ItemStatus;

/// One recipient's slot in a dispatch run.
///
/// All status changes go through the methods below; the scheduler never
/// assigns `status` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    pub recipient: Recipient,
    pub rendered_message: String,
    pub status: ItemStatus,

    /// Send attempts made so far (including the one in flight).
    pub attempts: u32,

    /// Earliest instant the item may be attempted again.
    pub scheduled_time: DateTime<Utc>,

    /// First successful send.
    pub sent_time: Option<DateTime<Utc>>,

    /// Last failure message.
    pub error: Option<String>,
}

impl QueueItem {
    pub fn new(
        id: ItemId,
        recipient: Recipient,
        rendered_message: String,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            recipient,
            rendered_message,
            status: ItemStatus::Pending,
            attempts: 0,
            scheduled_time,
            sent_time: None,
            error: None,
        }
    }

    pub fn is_eligible(&self, max_attempts: u32) -> bool {
        self.status.is_eligible(self.attempts, max_attempts)
    }

    /// Mark as sending (increment attempts).
    pub fn start_attempt(&mut self) {
        self.status = ItemStatus::Sending;
        self.attempts += 1;
    }

    /// Mark as sent. `confirm_at` is when delivery will be confirmed.
    pub fn mark_sent(&mut self, now: DateTime<Utc>, confirm_at: DateTime<Utc>) {
        self.status = ItemStatus::Sent;
        self.sent_time.get_or_insert(now);
        self.scheduled_time = confirm_at;
        self.error = None;
    }

    /// Flip `Sent -> Delivered`. Returns false if the item is in any other state.
    pub fn mark_delivered(&mut self) -> bool {
        if self.status != ItemStatus::Sent {
            return false;
        }
        self.status = ItemStatus::Delivered;
        true
    }

    /// Mark as failed and push `scheduled_time` to `retry_at`, whether or not
    /// another attempt will follow.
    pub fn mark_failed(&mut self, error: String, retry_at: DateTime<Utc>) {
        self.status = ItemStatus::Failed;
        self.error = Some(error);
        self.scheduled_time = retry_at;
    }

    /// Mark as permanently blocked.
    pub fn mark_blocked(&mut self, error: String) {
        self.status = ItemStatus::Blocked;
        self.error = Some(error);
    }
}
