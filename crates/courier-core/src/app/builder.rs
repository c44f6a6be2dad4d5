//! SchedulerBuilder - wiring and fail-fast validation.
//!
//! Everything except the sender has a default, so the smallest setup is:
//!
//! ```ignore
//! let scheduler = SchedulerBuilder::new(Arc::new(MySender))
//!     .build(recipients, MessageTemplate::new("Hi {{name}}"))?;
//! scheduler.start();
//! ```

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use super::scheduler::{Inner, RunState, Scheduler};
use crate::domain::{
    CourierError, Decider, DefaultDecider, MessageTemplate, Recipient, SchedulerState,
};
use crate::impls::{InMemoryCounterStore, NoopEventSink, SubstringClassifier};
use crate::ports::{
    Clock, CounterStore, EventSink, FailureClassifier, IdGenerator, MessageSender, SystemClock,
    UlidGenerator,
};
use crate::queue::{DailyCounter, DispatchPolicy, RunCore, materialize};

pub struct SchedulerBuilder {
    sender: Arc<dyn MessageSender>,
    policy: DispatchPolicy,
    clock: Arc<dyn Clock>,
    counter_store: Option<Arc<dyn CounterStore>>,
    events: Option<Arc<dyn EventSink>>,
    classifier: Option<Arc<dyn FailureClassifier>>,
    decider: Option<Arc<dyn Decider>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl SchedulerBuilder {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            sender,
            policy: DispatchPolicy::default(),
            clock: Arc::new(SystemClock),
            counter_store: None,
            events: None,
            classifier: None,
            decider: None,
            ids: None,
        }
    }

    pub fn policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Where the daily counter lives. Defaults to an in-memory store, which
    /// forgets the quota on restart.
    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the text classifier built from `policy.blocked_markers`.
    /// Ignored when a custom decider is set.
    pub fn classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate the policy, materialize the queue and return an idle scheduler.
    ///
    /// # Errors
    /// - `InvalidPolicy` if the policy fails `DispatchPolicy::validate`
    /// - `EmptyRecipients` if there is nobody to send to
    pub fn build(
        self,
        recipients: Vec<Recipient>,
        template: MessageTemplate,
    ) -> Result<Scheduler, CourierError> {
        self.policy.validate()?;

        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let items = materialize(
            recipients,
            &template,
            &self.policy,
            self.clock.now(),
            ids.as_ref(),
        )?;

        let decider = match self.decider {
            Some(decider) => decider,
            None => {
                let classifier = self.classifier.unwrap_or_else(|| {
                    Arc::new(SubstringClassifier::new(&self.policy.blocked_markers))
                });
                Arc::new(DefaultDecider::from_policy(&self.policy, classifier))
            }
        };
        let store = self
            .counter_store
            .unwrap_or_else(|| Arc::new(InMemoryCounterStore::new()));
        let daily = DailyCounter::new(store, self.policy.counter_key_prefix.clone());
        let (control, _) = watch::channel(SchedulerState::Idle);

        Ok(Scheduler::from_inner(Inner {
            run_id: ids.generate_run_id(),
            total: items.len(),
            policy: self.policy.clone(),
            clock: self.clock,
            sender: self.sender,
            decider,
            events: self.events.unwrap_or_else(|| Arc::new(NoopEventSink)),
            state: Mutex::new(RunState {
                core: RunCore::new(items, self.policy),
                daily,
            }),
            control,
        }))
    }
}
