//! Queue materialization: recipients + template -> staggered queue items.

use chrono::{DateTime, Utc};

use super::DispatchPolicy;
use crate::domain::{CourierError, MessageTemplate, QueueItem, Recipient};
use crate::ports::{IdGenerator, add_duration};

/// Build one pending item per recipient, in input order.
///
/// Item `i` is scheduled at `now + i * policy.stagger()`, so an unthrottled
/// run starts out at the target rate.
pub fn materialize(
    recipients: Vec<Recipient>,
    template: &MessageTemplate,
    policy: &DispatchPolicy,
    now: DateTime<Utc>,
    ids: &dyn IdGenerator,
) -> Result<Vec<QueueItem>, CourierError> {
    if recipients.is_empty() {
        return Err(CourierError::EmptyRecipients);
    }

    let stagger = policy.stagger();
    let items = recipients
        .into_iter()
        .enumerate()
        .map(|(index, recipient)| {
            let slot = u32::try_from(index).unwrap_or(u32::MAX);
            let offset = stagger.saturating_mul(slot);
            let message = template.render(&recipient);
            QueueItem::new(
                ids.generate_item_id(),
                recipient,
                message,
                add_duration(now, offset),
            )
        })
        .collect();
    Ok(items)
}
