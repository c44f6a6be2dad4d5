//! Dispatch policy: pacing, batching, quota and retry knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::CourierError;

/// How a `sent` item becomes `delivered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Confirm automatically `after_ms` after the send succeeded.
    Timed { after_ms: u64 },

    /// The host confirms via `Scheduler::confirm_delivery`.
    External,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::Timed { after_ms: 3_000 }
    }
}

/// Every tunable of a dispatch run.
///
/// Defaults keep a WhatsApp session under the pace that tends to trigger
/// automation bans: 20 messages a minute, batches of 200 with a 5 minute
/// break, 2000 a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    /// Successful sends allowed per local calendar day.
    pub daily_limit: u64,

    /// Successful sends between two batch pauses.
    pub batch_size: u32,

    /// Target rate used to stagger the initial schedule.
    pub messages_per_minute: u32,

    pub batch_pause_minutes: u64,

    /// Attempts per item, first one included.
    pub max_attempts: u32,

    /// Delay between two completed attempts.
    pub inter_item_delay_ms: u64,

    /// Re-check interval while waiting on a gate.
    pub poll_interval_ms: u64,

    /// Fixed (non-exponential) delay before retrying a transient failure.
    pub retry_backoff_secs: u64,

    pub delivery: DeliveryMode,

    /// Case-insensitive substrings that mark an error as a blocked recipient.
    pub blocked_markers: Vec<String>,

    /// Prefix of the daily counter key (`{prefix}:{YYYY-MM-DD}`).
    pub counter_key_prefix: String,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            daily_limit: 2_000,
            batch_size: 200,
            messages_per_minute: 20,
            batch_pause_minutes: 5,
            max_attempts: 3,
            inter_item_delay_ms: 3_000,
            poll_interval_ms: 1_000,
            retry_backoff_secs: 30,
            delivery: DeliveryMode::default(),
            blocked_markers: default_blocked_markers(),
            counter_key_prefix: "daily_sent".to_string(),
        }
    }
}

pub fn default_blocked_markers() -> Vec<String> {
    [
        "blocked",
        "invalid number",
        "invalid phone",
        "not registered",
        "not on whatsapp",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl DispatchPolicy {
    /// Reject settings that would stall the loop or divide by zero.
    pub fn validate(&self) -> Result<(), CourierError> {
        let zeroes = [
            ("messages_per_minute", self.messages_per_minute == 0),
            ("batch_size", self.batch_size == 0),
            ("max_attempts", self.max_attempts == 0),
            ("daily_limit", self.daily_limit == 0),
            ("poll_interval_ms", self.poll_interval_ms == 0),
        ];
        match zeroes.into_iter().find(|(_, zero)| *zero) {
            Some((field, _)) => Err(CourierError::InvalidPolicy(format!("{field} must be > 0"))),
            None => Ok(()),
        }
    }

    /// Spacing between consecutive items in the initial schedule.
    pub fn stagger(&self) -> Duration {
        Duration::from_secs(60) / self.messages_per_minute.max(1)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_pause_minutes.saturating_mul(60))
    }

    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    /// Delay before automatic delivery confirmation, if any.
    pub fn delivery_delay(&self) -> Option<Duration> {
        match self.delivery {
            DeliveryMode::Timed { after_ms } => Some(Duration::from_millis(after_ms)),
            DeliveryMode::External => None,
        }
    }
}
