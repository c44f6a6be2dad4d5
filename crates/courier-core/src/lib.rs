//! courier-core
//!
//! Rate-limited, batched mass-send scheduling with retries and a persistent
//! daily quota.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, recipient, item, status, decision, errors, events, stats）
//! - **ports**: 抽象化レイヤー（MessageSender, CounterStore, Clock, EventSink, など）
//! - **queue**: 純粋な状態機械（policy, materialize, daily counter, RunCore）
//! - **app**: 非同期ドライバ（SchedulerBuilder, Scheduler）
//! - **impls**: 実装（in-memory / JSON file counter store, classifier, event sinks）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{Scheduler, SchedulerBuilder};
