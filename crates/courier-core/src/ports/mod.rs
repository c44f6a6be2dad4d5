//! Ports - 抽象化レイヤー
//!
//! Each trait is a seam to something outside the scheduler: the messaging
//! transport, durable storage, time, ids, and the host that observes a run.

pub mod classifier;
pub mod clock;
pub mod counter_store;
pub mod event_sink;
pub mod id_generator;
pub mod sender;

pub use self::classifier::FailureClassifier;
pub use self::clock::{Clock, FixedClock, MonotonicClock, SystemClock, add_duration};
pub use self::counter_store::CounterStore;
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::sender::MessageSender;
