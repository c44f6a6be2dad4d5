//! InMemoryCounterStore - 開発用・テスト用のカウンタストア

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::CounterStore;

/// Counters kept in a `HashMap`; gone when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one counter (e.g. a quota already partly used).
    pub fn with_value(key: impl Into<String>, value: u64) -> Self {
        let store = Self::new();
        if let Ok(mut counters) = store.counters.lock() {
            counters.insert(key.into(), value);
        }
        store
    }
}

impl CounterStore for InMemoryCounterStore {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let counters = self.counters.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(counters.get(key).copied())
    }

    fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let mut counters = self.counters.lock().map_err(|_| StoreError::Poisoned)?;
        counters.insert(key.to_string(), value);
        Ok(())
    }
}
