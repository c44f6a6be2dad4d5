//! CounterStore port - 日次カウンタの永続化
//!
//! Only the daily quota needs durability; everything else about a run lives
//! in memory.

use crate::domain::StoreError;

/// Key-value store of integer counters.
///
/// # 実装
/// - `InMemoryCounterStore`: tests and one-shot runs
/// - `JsonFileCounterStore`: survives process restarts
pub trait CounterStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    fn set(&self, key: &str, value: u64) -> Result<(), StoreError>;
}
