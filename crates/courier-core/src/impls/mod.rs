//! Impls - in-process implementations of the ports.
//!
//! # 含まれる実装
//! - **InMemoryCounterStore** / **JsonFileCounterStore**: daily counter storage
//! - **SubstringClassifier**: text-based failure classification
//! - **NoopEventSink** / **ChannelEventSink**: event delivery to the host
//!
//! Real message transports live outside this crate and plug in through
//! `ports::MessageSender`.

pub mod event_sinks;
pub mod file_store;
pub mod memory_store;
pub mod substring_classifier;

pub use self::event_sinks::{ChannelEventSink, NoopEventSink};
pub use self::file_store::JsonFileCounterStore;
pub use self::memory_store::InMemoryCounterStore;
pub use self::substring_classifier::SubstringClassifier;
