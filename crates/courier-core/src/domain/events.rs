//! Events a scheduler reports to its host.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::RunId;
use super::item::QueueItem;
use super::stats::QueueStats;

/// Everything observable about a run, in emission order.
///
/// `Completed` and `Cancelled` are each emitted at most once per run and
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    Started {
        run_id: RunId,
        total: usize,
    },

    /// An item changed status.
    ItemUpdated {
        run_id: RunId,
        item: QueueItem,
    },

    /// A full batch went out; dispatch resumes at `until`.
    BatchPaused {
        run_id: RunId,
        until: DateTime<Utc>,
    },

    Paused {
        run_id: RunId,
    },

    Resumed {
        run_id: RunId,
    },

    /// The daily quota is spent; the run halted without completing.
    DailyLimitReached {
        run_id: RunId,
        sent_today: u64,
        limit: u64,
    },

    /// No eligible items remain. Carries the final queue.
    Completed {
        run_id: RunId,
        items: Vec<QueueItem>,
    },

    /// The host stopped the run.
    Cancelled {
        run_id: RunId,
        stats: QueueStats,
    },
}
