//! Queue module: policy, materialization, daily quota and the dispatch state machine.

mod daily;
mod materialize;
mod policy;
mod run_core;

pub use daily::DailyCounter;
pub use materialize::materialize;
pub use policy::{DeliveryMode, DispatchPolicy, default_blocked_markers};
pub use run_core::{BatchProgress, Dispatch, RunCore, Tick, WaitReason};
