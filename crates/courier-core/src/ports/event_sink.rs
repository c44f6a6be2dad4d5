//! EventSink port - how a scheduler reports progress to its host.

use crate::domain::DispatchEvent;

/// Receives dispatch events.
///
/// Called while the scheduler holds its queue lock: implementations must not
/// block and must not call back into the scheduler.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DispatchEvent);
}
