//! RunCore - the dispatch state machine, without any I/O or timers.
//!
//! The async driver calls `tick` once per activation and acts on the
//! returned `Tick`; after the send it reports back through
//! `record_success` / `record_failure`. Keeping this synchronous makes every
//! gate testable with a plain `DateTime`.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::DispatchPolicy;
use crate::domain::{
    Decider, Decision, ItemId, ItemStatus, QueueItem, QueueStats, Recipient, SendError,
};
use crate::ports::add_duration;

/// Why an activation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// A full batch went out and the pause has not elapsed.
    BatchPause,

    /// The next eligible item is scheduled in the future.
    NotDue,

    /// Nothing left to send, but timed delivery confirmations are pending.
    AwaitingDelivery,
}

/// A send the driver must perform.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub index: usize,
    pub item_id: ItemId,
    pub recipient: Recipient,
    pub message: String,
    pub attempt: u32,
}

/// Batch bookkeeping after a recorded success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Successful sends in the current batch, this one included.
    pub batch_sent: u32,

    /// Set when this send completed the batch.
    pub pause_until: Option<DateTime<Utc>>,
}

/// Result of one activation.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// No eligible items remain and no timed confirmation is outstanding.
    Complete,

    /// The daily quota is spent.
    LimitReached { sent_today: u64 },

    /// Nothing to do yet; activate again after `delay`.
    Wait { delay: Duration, reason: WaitReason },

    /// The item at `index` is now `sending`.
    Dispatch(Dispatch),
}

/// In-memory queue plus batch bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct RunCore {
    items: Vec<QueueItem>,
    policy: DispatchPolicy,

    /// Successful sends since the last batch pause ended.
    batch_sent: u32,

    /// Set when `batch_sent` reaches `batch_size`.
    pause_until: Option<DateTime<Utc>>,
}

impl RunCore {
    pub fn new(items: Vec<QueueItem>, policy: DispatchPolicy) -> Self {
        Self {
            items,
            policy,
            batch_sent: 0,
            pause_until: None,
        }
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::from_items(&self.items)
    }

    pub fn batch_sent(&self) -> u32 {
        self.batch_sent
    }

    pub fn pause_until(&self) -> Option<DateTime<Utc>> {
        self.pause_until
    }

    /// Under `DeliveryMode::Timed` every `sent` item has a confirmation armed.
    fn awaiting_timed_delivery(&self) -> bool {
        self.policy.delivery_delay().is_some()
            && self.items.iter().any(|i| i.status == ItemStatus::Sent)
    }

    fn first_eligible(&self) -> Option<usize> {
        let max_attempts = self.policy.max_attempts;
        self.items.iter().position(|i| i.is_eligible(max_attempts))
    }

    /// Run the gates in order and, if all pass, mark the chosen item `sending`.
    ///
    /// 1. no eligible item -> `Complete` (`Wait` while timed confirmations
    ///    are still outstanding)
    /// 2. `sent_today >= daily_limit` -> `LimitReached`
    /// 3. batch pause still running -> `Wait`
    /// 4. first eligible item (queue order) not due -> `Wait`
    /// 5. otherwise -> `Dispatch`
    pub fn tick(&mut self, now: DateTime<Utc>, sent_today: u64) -> Tick {
        let Some(index) = self.first_eligible() else {
            if self.awaiting_timed_delivery() {
                return Tick::Wait {
                    delay: self.policy.poll_interval(),
                    reason: WaitReason::AwaitingDelivery,
                };
            }
            return Tick::Complete;
        };

        if sent_today >= self.policy.daily_limit {
            return Tick::LimitReached { sent_today };
        }

        if self.batch_sent >= self.policy.batch_size {
            match self.pause_until {
                Some(until) if now < until => {
                    return Tick::Wait {
                        delay: self.policy.poll_interval(),
                        reason: WaitReason::BatchPause,
                    };
                }
                _ => {
                    self.batch_sent = 0;
                    self.pause_until = None;
                }
            }
        }

        let item = &mut self.items[index];
        if item.scheduled_time > now {
            return Tick::Wait {
                delay: self.policy.poll_interval(),
                reason: WaitReason::NotDue,
            };
        }

        item.start_attempt();
        Tick::Dispatch(Dispatch {
            index,
            item_id: item.id,
            recipient: item.recipient.clone(),
            message: item.rendered_message.clone(),
            attempt: item.attempts,
        })
    }

    /// Apply a successful send.
    ///
    /// Returns `None` (and changes nothing) unless the item is still `sending`.
    pub fn record_success(&mut self, index: usize, now: DateTime<Utc>) -> Option<BatchProgress> {
        let confirm_at = add_duration(now, self.policy.delivery_delay().unwrap_or_default());
        let item = self
            .items
            .get_mut(index)
            .filter(|item| item.status == ItemStatus::Sending)?;
        item.mark_sent(now, confirm_at);

        self.batch_sent = self.batch_sent.saturating_add(1);
        let pause_until = if self.batch_sent == self.policy.batch_size {
            let until = add_duration(now, self.policy.batch_pause());
            self.pause_until = Some(until);
            Some(until)
        } else {
            None
        };
        Some(BatchProgress {
            batch_sent: self.batch_sent,
            pause_until,
        })
    }

    /// Apply a failed send as `decider` says.
    ///
    /// Returns `None` (and changes nothing) unless the item is still `sending`.
    pub fn record_failure(
        &mut self,
        index: usize,
        error: &SendError,
        decider: &dyn Decider,
        now: DateTime<Utc>,
    ) -> Option<Decision> {
        let item = self
            .items
            .get_mut(index)
            .filter(|item| item.status == ItemStatus::Sending)?;
        let decision = decider.decide(item, error);
        let message = error.message().to_string();
        match &decision {
            Decision::Block { .. } => item.mark_blocked(message),
            Decision::Retry { delay, .. } => item.mark_failed(message, add_duration(now, *delay)),
            Decision::GiveUp { .. } => {
                item.mark_failed(message, add_duration(now, self.policy.retry_backoff()));
            }
        }
        Some(decision)
    }

    /// Flip `sent -> delivered`. Returns the updated item if it changed.
    pub fn confirm_delivery(&mut self, item_id: ItemId) -> Option<&QueueItem> {
        let item = self.items.iter_mut().find(|item| item.id == item_id)?;
        if item.mark_delivered() {
            Some(&*item)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DefaultDecider, MessageTemplate};
    use crate::impls::SubstringClassifier;
    use crate::ports::{FixedClock, UlidGenerator};
    use crate::queue::{DeliveryMode, materialize};
    use chrono::{TimeDelta, TimeZone};
    use std::sync::Arc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn core_with(n: usize, policy: DispatchPolicy) -> RunCore {
        let ids = UlidGenerator::new(FixedClock::new(start()));
        let recipients = (0..n)
            .map(|i| Recipient::new(format!("r{i}"), format!("{i}")))
            .collect();
        let items = materialize(
            recipients,
            &MessageTemplate::new("Hi {{name}}"),
            &policy,
            start(),
            &ids,
        )
        .unwrap();
        RunCore::new(items, policy)
    }

    fn decider(policy: &DispatchPolicy) -> DefaultDecider {
        DefaultDecider::from_policy(policy, Arc::new(SubstringClassifier::default()))
    }

    fn expect_dispatch(tick: Tick) -> Dispatch {
        match tick {
            Tick::Dispatch(d) => d,
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[test]
    fn dispatches_first_due_item_and_marks_it_sending() {
        let mut core = core_with(3, DispatchPolicy::default());
        let d = expect_dispatch(core.tick(start(), 0));
        assert_eq!(d.index, 0);
        assert_eq!(d.message, "Hi r0");
        assert_eq!(d.attempt, 1);
        assert_eq!(core.items()[0].status, ItemStatus::Sending);
        assert_eq!(core.stats().sending, 1);
    }

    #[test]
    fn future_item_waits_without_mutation() {
        let mut core = core_with(2, DispatchPolicy::default());
        let d = expect_dispatch(core.tick(start(), 0));
        core.record_success(d.index, start());

        let before = core.items().to_vec();
        let tick = core.tick(start() + TimeDelta::seconds(1), 1);
        assert_eq!(
            tick,
            Tick::Wait {
                delay: Duration::from_secs(1),
                reason: WaitReason::NotDue,
            }
        );
        assert_eq!(core.items(), before.as_slice());
    }

    #[test]
    fn quota_gate_runs_before_anything_else() {
        let mut core = core_with(2, DispatchPolicy::default());
        assert_eq!(
            core.tick(start(), 2000),
            Tick::LimitReached { sent_today: 2000 }
        );
        assert_eq!(core.stats().pending, 2);
    }

    #[test]
    fn exhausted_queue_completes_even_when_over_quota() {
        let policy = DispatchPolicy::default();
        let mut core = core_with(1, policy.clone());
        let d = expect_dispatch(core.tick(start(), 0));
        let error = SendError::new("number blocked");
        core.record_failure(d.index, &error, &decider(&policy), start());
        assert_eq!(core.tick(start(), 5000), Tick::Complete);
    }

    #[test]
    fn batch_pause_holds_dispatch_until_deadline() {
        let policy = DispatchPolicy {
            batch_size: 2,
            messages_per_minute: 60,
            ..DispatchPolicy::default()
        };
        let mut core = core_with(3, policy);
        let mut now = start();

        for _ in 0..2 {
            let d = expect_dispatch(core.tick(now, 0));
            let progress = core.record_success(d.index, now).unwrap();
            assert_eq!(progress.batch_sent, d.index as u32 + 1);
            if d.index == 1 {
                assert_eq!(progress.pause_until, Some(now + TimeDelta::minutes(5)));
            } else {
                assert_eq!(progress.pause_until, None);
            }
            now += TimeDelta::seconds(3);
        }
        assert_eq!(core.batch_sent(), 2);

        assert!(matches!(
            core.tick(now, 2),
            Tick::Wait {
                reason: WaitReason::BatchPause,
                ..
            }
        ));

        let resume_at = core.pause_until().unwrap();
        let d = expect_dispatch(core.tick(resume_at, 2));
        assert_eq!(d.index, 2);
        assert_eq!(core.batch_sent(), 0);
        assert_eq!(core.pause_until(), None);
    }

    #[test]
    fn transient_failure_keeps_position_and_backs_off() {
        let policy = DispatchPolicy {
            messages_per_minute: 60,
            ..DispatchPolicy::default()
        };
        let decider = decider(&policy);
        let mut core = core_with(2, policy);

        let d = expect_dispatch(core.tick(start(), 0));
        let decision = core
            .record_failure(d.index, &SendError::new("timeout"), &decider, start())
            .unwrap();
        assert!(matches!(decision, Decision::Retry { .. }));
        let failed = &core.items()[0];
        assert_eq!(failed.status, ItemStatus::Failed);
        assert_eq!(failed.scheduled_time, start() + TimeDelta::seconds(30));
        assert_eq!(failed.error.as_deref(), Some("timeout"));

        // The failed item is still first in line, so it gates item 1.
        assert!(matches!(
            core.tick(start() + TimeDelta::seconds(3), 0),
            Tick::Wait {
                reason: WaitReason::NotDue,
                ..
            }
        ));
        let d = expect_dispatch(core.tick(start() + TimeDelta::seconds(30), 0));
        assert_eq!(d.index, 0);
        assert_eq!(d.attempt, 2);
    }

    #[test]
    fn attempts_never_exceed_budget() {
        let policy = DispatchPolicy::default();
        let decider = decider(&policy);
        let mut core = core_with(1, policy);
        let mut now = start();
        let mut last_attempt = now;

        loop {
            match core.tick(now, 0) {
                Tick::Complete => break,
                Tick::Dispatch(d) => {
                    core.record_failure(d.index, &SendError::new("timeout"), &decider, now);
                    last_attempt = now;
                }
                Tick::Wait { .. } => {}
                Tick::LimitReached { .. } => unreachable!(),
            }
            now += TimeDelta::seconds(10);
        }
        let item = &core.items()[0];
        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.attempts, 3);
        // giving up still stamps the backoff, like every transient failure
        assert_eq!(item.scheduled_time, last_attempt + TimeDelta::seconds(30));
    }

    #[test]
    fn completion_waits_for_timed_confirmations() {
        let mut core = core_with(1, DispatchPolicy::default());
        let d = expect_dispatch(core.tick(start(), 0));
        core.record_success(d.index, start());

        let later = start() + TimeDelta::seconds(3);
        assert_eq!(
            core.tick(later, 1),
            Tick::Wait {
                delay: Duration::from_secs(1),
                reason: WaitReason::AwaitingDelivery,
            }
        );
        core.confirm_delivery(d.item_id);
        assert_eq!(core.tick(later, 1), Tick::Complete);
    }

    #[test]
    fn external_delivery_does_not_hold_completion() {
        let policy = DispatchPolicy {
            delivery: DeliveryMode::External,
            ..DispatchPolicy::default()
        };
        let mut core = core_with(1, policy);
        let d = expect_dispatch(core.tick(start(), 0));
        core.record_success(d.index, start());

        assert_eq!(core.tick(start(), 1), Tick::Complete);
        assert_eq!(core.items()[0].status, ItemStatus::Sent);
    }

    #[test]
    fn results_for_items_not_sending_are_ignored() {
        let policy = DispatchPolicy::default();
        let mut core = core_with(1, policy.clone());
        assert_eq!(core.record_success(0, start()), None);
        assert_eq!(
            core.record_failure(0, &SendError::new("x"), &decider(&policy), start()),
            None
        );
        assert_eq!(core.record_success(7, start()), None);
        assert_eq!(core.items()[0].status, ItemStatus::Pending);
    }

    #[test]
    fn delivery_confirmation_only_applies_to_sent_items() {
        let mut core = core_with(1, DispatchPolicy::default());
        let id = core.items()[0].id;
        assert!(core.confirm_delivery(id).is_none());

        let d = expect_dispatch(core.tick(start(), 0));
        core.record_success(d.index, start());
        assert_eq!(
            core.items()[0].scheduled_time,
            start() + TimeDelta::seconds(3)
        );
        let updated = core.confirm_delivery(id).unwrap();
        assert_eq!(updated.status, ItemStatus::Delivered);
        assert!(core.confirm_delivery(id).is_none());
    }
}
