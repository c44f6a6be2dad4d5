//! Domain model (ids, recipients, items, statuses, decisions, events, errors).

pub mod decision;
pub mod errors;
pub mod events;
pub mod ids;
pub mod item;
pub mod recipient;
pub mod stats;
pub mod status;

pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{CourierError, FailureKind, SendError, StoreError};
pub use events::DispatchEvent;
pub use ids::{ItemId, RunId};
pub use item::QueueItem;
pub use recipient::{MessageTemplate, Recipient};
pub use stats::QueueStats;
pub use status::{ItemStatus, SchedulerState};
