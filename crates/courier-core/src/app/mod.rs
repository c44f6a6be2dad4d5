//! App - アプリケーション層
//!
//! ports と queue を組み合わせて、1 回分の配信 run を動かします。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 依存のワイヤリングと fail-fast な検証
//! - **Scheduler**: run のハンドル（start / pause / resume / stop / confirm_delivery）

pub mod builder;
pub mod scheduler;

pub use self::builder::SchedulerBuilder;
pub use self::scheduler::Scheduler;
