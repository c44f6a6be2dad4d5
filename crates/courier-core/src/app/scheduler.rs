//! Scheduler - drives a `RunCore` against a `MessageSender`.
//!
//! One driver task per run. It owns the only pending timer (`next_at`) and
//! re-activates the core whenever that timer fires, so every gate is a
//! deferred re-activation rather than a blocking sleep.
//!
//! Control state lives in a `watch` channel: `pause` / `stop` wake the
//! driver out of its wait without moving `next_at`, so pacing survives a
//! pause/resume cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::{
    Decider, Decision, DispatchEvent, ItemId, QueueItem, QueueStats, RunId, SchedulerState,
};
use crate::ports::{Clock, EventSink, MessageSender};
use crate::queue::{DailyCounter, DispatchPolicy, RunCore, Tick};

/// Handle to one dispatch run. Cheap to clone.
///
/// Dropping every handle does not stop a started run; call `stop`.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) run_id: RunId,
    pub(crate) total: usize,
    pub(crate) policy: DispatchPolicy,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sender: Arc<dyn MessageSender>,
    pub(crate) decider: Arc<dyn Decider>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) state: Mutex<RunState>,
    pub(crate) control: watch::Sender<SchedulerState>,
}

/// Everything the queue lock protects.
pub(crate) struct RunState {
    pub(crate) core: RunCore,
    pub(crate) daily: DailyCounter,
}

/// What the driver does after an activation.
enum Activation {
    Wait(Duration),
    Dispatched,
    Finished,
}

impl Scheduler {
    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.inner.run_id
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.inner.policy
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.control.borrow()
    }

    /// Current queue, in original order.
    pub async fn snapshot(&self) -> Vec<QueueItem> {
        self.inner.state.lock().await.core.items().to_vec()
    }

    pub async fn stats(&self) -> QueueStats {
        self.inner.state.lock().await.core.stats()
    }

    /// Begin dispatching. Returns false (and does nothing) unless idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let started = self.inner.control.send_if_modified(|state| {
            transition(state, &[SchedulerState::Idle], SchedulerState::Running)
        });
        if !started {
            return false;
        }

        let run_id = self.inner.run_id;
        info!(%run_id, "dispatch run started");
        self.inner.events.emit(DispatchEvent::Started {
            run_id,
            total: self.inner.total,
        });

        let span = info_span!("dispatch_run", %run_id);
        let control = self.inner.control.subscribe();
        tokio::spawn(drive(Arc::clone(&self.inner), control).instrument(span));
        true
    }

    /// Stop advancing. A send already in flight finishes and is applied.
    pub fn pause(&self) -> bool {
        let paused = self.inner.control.send_if_modified(|state| {
            transition(state, &[SchedulerState::Running], SchedulerState::Paused)
        });
        if paused {
            info!(run_id = %self.inner.run_id, "dispatch run paused");
            self.inner.events.emit(DispatchEvent::Paused {
                run_id: self.inner.run_id,
            });
        }
        paused
    }

    pub fn resume(&self) -> bool {
        let resumed = self.inner.control.send_if_modified(|state| {
            transition(state, &[SchedulerState::Paused], SchedulerState::Running)
        });
        if resumed {
            info!(run_id = %self.inner.run_id, "dispatch run resumed");
            self.inner.events.emit(DispatchEvent::Resumed {
                run_id: self.inner.run_id,
            });
        }
        resumed
    }

    /// Cancel the run. Emits `Cancelled` exactly once; a send still in flight
    /// is discarded when it returns.
    pub async fn stop(&self) -> bool {
        let state = self.inner.state.lock().await;
        let stopped = self.inner.control.send_if_modified(|s| {
            transition(
                s,
                &[
                    SchedulerState::Idle,
                    SchedulerState::Running,
                    SchedulerState::Paused,
                ],
                SchedulerState::Stopped,
            )
        });
        if stopped {
            let stats = state.core.stats();
            info!(run_id = %self.inner.run_id, ?stats, "dispatch run stopped");
            self.inner.events.emit(DispatchEvent::Cancelled {
                run_id: self.inner.run_id,
                stats,
            });
        }
        stopped
    }

    /// Report that the transport confirmed delivery of `item_id`.
    ///
    /// Returns true if the item moved from `sent` to `delivered`.
    pub async fn confirm_delivery(&self, item_id: ItemId) -> bool {
        self.inner.confirm_delivery(item_id).await
    }

    /// Resolve once the run reaches a terminal state.
    pub async fn wait(&self) -> SchedulerState {
        let mut rx = self.inner.control.subscribe();
        let reached = rx
            .wait_for(|state| state.is_terminal())
            .await
            .map(|state| *state);
        reached.unwrap_or_else(|_| *self.inner.control.borrow())
    }
}

/// Move `state` to `to` if it is one of `from`. Returns whether it moved.
fn transition(state: &mut SchedulerState, from: &[SchedulerState], to: SchedulerState) -> bool {
    if from.contains(state) {
        *state = to;
        true
    } else {
        false
    }
}

impl Inner {
    fn emit_item(&self, item: &QueueItem) {
        self.events.emit(DispatchEvent::ItemUpdated {
            run_id: self.run_id,
            item: item.clone(),
        });
    }

    /// End the run from the driver side (running or paused -> `to`).
    fn finish(&self, to: SchedulerState) -> bool {
        self.control.send_if_modified(|state| {
            transition(
                state,
                &[SchedulerState::Running, SchedulerState::Paused],
                to,
            )
        })
    }

    async fn confirm_delivery(&self, item_id: ItemId) -> bool {
        let mut state = self.state.lock().await;
        if *self.control.borrow() == SchedulerState::Stopped {
            return false;
        }
        match state.core.confirm_delivery(item_id) {
            Some(item) => {
                debug!(%item_id, "delivery confirmed");
                self.emit_item(item);
                true
            }
            None => false,
        }
    }

    fn arm_delivery(self: &Arc<Self>, item_id: ItemId, delay: Duration) {
        let inner = Arc::clone(self);
        tokio::spawn(
            async move {
                sleep(delay).await;
                inner.confirm_delivery(item_id).await;
            }
            .in_current_span(),
        );
    }

    /// One loop activation: gates, then at most one send.
    async fn activate(self: &Arc<Self>) -> Activation {
        let dispatch = {
            let mut guard = self.state.lock().await;
            if *self.control.borrow() != SchedulerState::Running {
                return Activation::Wait(Duration::ZERO);
            }
            let RunState { core, daily } = &mut *guard;
            let now = self.clock.now();
            let sent_today = daily.current(self.clock.today());

            match core.tick(now, sent_today) {
                Tick::Complete => {
                    if self.finish(SchedulerState::Completed) {
                        let stats = core.stats();
                        info!(?stats, "dispatch run completed");
                        self.events.emit(DispatchEvent::Completed {
                            run_id: self.run_id,
                            items: core.items().to_vec(),
                        });
                    }
                    return Activation::Finished;
                }
                Tick::LimitReached { sent_today } => {
                    if self.finish(SchedulerState::LimitReached) {
                        let limit = self.policy.daily_limit;
                        warn!(sent_today, limit, "daily limit reached; halting run");
                        self.events.emit(DispatchEvent::DailyLimitReached {
                            run_id: self.run_id,
                            sent_today,
                            limit,
                        });
                    }
                    return Activation::Finished;
                }
                Tick::Wait { delay, reason } => {
                    debug!(?reason, ?delay, "waiting");
                    return Activation::Wait(delay);
                }
                Tick::Dispatch(dispatch) => {
                    if let Some(item) = core.item(dispatch.index) {
                        self.emit_item(item);
                    }
                    debug!(item_id = %dispatch.item_id, attempt = dispatch.attempt, "dispatching");
                    dispatch
                }
            }
        };

        // 送信中はロックを持たない
        let result = self
            .sender
            .send(&dispatch.recipient, &dispatch.message)
            .await;

        let mut guard = self.state.lock().await;
        if *self.control.borrow() == SchedulerState::Stopped {
            debug!(item_id = %dispatch.item_id, "run stopped mid-send; result discarded");
            return Activation::Finished;
        }
        let RunState { core, daily } = &mut *guard;
        let now = self.clock.now();

        match result {
            Ok(()) => {
                if let Some(progress) = core.record_success(dispatch.index, now) {
                    let sent_today = daily.increment(self.clock.today());
                    info!(
                        item_id = %dispatch.item_id,
                        attempt = dispatch.attempt,
                        sent_today,
                        batch_sent = progress.batch_sent,
                        "message sent"
                    );
                    if let Some(until) = progress.pause_until {
                        info!(%until, "batch complete; pausing");
                        self.events.emit(DispatchEvent::BatchPaused {
                            run_id: self.run_id,
                            until,
                        });
                    }
                    if let Some(delay) = self.policy.delivery_delay() {
                        self.arm_delivery(dispatch.item_id, delay);
                    }
                }
            }
            Err(err) => {
                let decider = self.decider.as_ref();
                match core.record_failure(dispatch.index, &err, decider, now) {
                    Some(Decision::Retry { reason, .. }) => {
                        warn!(item_id = %dispatch.item_id, error = %err, %reason, "send failed");
                    }
                    Some(Decision::GiveUp { reason }) => {
                        warn!(
                            item_id = %dispatch.item_id,
                            error = %err,
                            %reason,
                            "send failed; giving up"
                        );
                    }
                    Some(Decision::Block { reason }) => {
                        warn!(item_id = %dispatch.item_id, %reason, "recipient blocked");
                    }
                    None => {}
                }
            }
        }
        if let Some(item) = core.item(dispatch.index) {
            self.emit_item(item);
        }
        Activation::Dispatched
    }
}

async fn drive(inner: Arc<Inner>, mut control: watch::Receiver<SchedulerState>) {
    let mut next_at = Instant::now();
    loop {
        let state = *control.borrow_and_update();
        match state {
            SchedulerState::Running => {}
            SchedulerState::Idle | SchedulerState::Paused => {
                if control.changed().await.is_err() {
                    return;
                }
                continue;
            }
            SchedulerState::Stopped | SchedulerState::Completed | SchedulerState::LimitReached => {
                debug!(?state, "driver exiting");
                return;
            }
        }

        tokio::select! {
            changed = control.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
            _ = sleep_until(next_at) => {}
        }

        next_at = match inner.activate().await {
            Activation::Wait(delay) => Instant::now() + delay,
            Activation::Dispatched => Instant::now() + inner.policy.inter_item_delay(),
            Activation::Finished => return,
        };
    }
}
