//! Daily send counter backed by a `CounterStore`.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::ports::CounterStore;

/// Successful sends for the current local day.
///
/// Reads go to the store every time so a counter bumped by another process
/// (or a restart) is honored. When the store fails, the last value seen for
/// the same day is used instead.
pub struct DailyCounter {
    store: Arc<dyn CounterStore>,
    prefix: String,
    last_seen: Option<(NaiveDate, u64)>,
}

impl DailyCounter {
    pub fn new(store: Arc<dyn CounterStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            last_seen: None,
        }
    }

    pub fn key_for(&self, date: NaiveDate) -> String {
        format!("{}:{}", self.prefix, date.format("%Y-%m-%d"))
    }

    /// Sends recorded for `date`.
    pub fn current(&mut self, date: NaiveDate) -> u64 {
        let key = self.key_for(date);
        match self.store.get(&key) {
            Ok(value) => {
                let value = value.unwrap_or(0);
                self.last_seen = Some((date, value));
                value
            }
            Err(err) => {
                let fallback = self.cached(date);
                warn!(key = %key, error = %err, fallback, "daily counter read failed");
                fallback
            }
        }
    }

    /// Record one more send for `date` and return the new total.
    pub fn increment(&mut self, date: NaiveDate) -> u64 {
        let next = self.current(date).saturating_add(1);
        let key = self.key_for(date);
        if let Err(err) = self.store.set(&key, next) {
            warn!(key = %key, error = %err, "daily counter write failed");
        }
        self.last_seen = Some((date, next));
        next
    }

    fn cached(&self, date: NaiveDate) -> u64 {
        match self.last_seen {
            Some((seen, value)) if seen == date => value,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoreError;
    use crate::impls::InMemoryCounterStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn counts_are_keyed_by_date() {
        let store = Arc::new(InMemoryCounterStore::new());
        let mut counter = DailyCounter::new(store.clone(), "daily_sent");

        assert_eq!(counter.current(day(1)), 0);
        assert_eq!(counter.increment(day(1)), 1);
        assert_eq!(counter.increment(day(1)), 2);
        assert_eq!(counter.current(day(2)), 0);

        assert_eq!(store.get("daily_sent:2024-03-01").unwrap(), Some(2));
    }

    #[test]
    fn counter_survives_a_new_instance() {
        let store: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
        DailyCounter::new(store.clone(), "p").increment(day(5));

        let mut reloaded = DailyCounter::new(store, "p");
        assert_eq!(reloaded.current(day(5)), 1);
    }

    struct FlakyStore {
        inner: InMemoryCounterStore,
        broken: AtomicBool,
    }

    impl CounterStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Poisoned);
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Poisoned);
            }
            self.inner.set(key, value)
        }
    }

    #[test]
    fn store_failure_falls_back_to_last_seen_value() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryCounterStore::new(),
            broken: AtomicBool::new(false),
        });
        let mut counter = DailyCounter::new(store.clone(), "p");
        counter.increment(day(1));
        counter.increment(day(1));

        store.broken.store(true, Ordering::SeqCst);
        assert_eq!(counter.current(day(1)), 2);
        // never decrements, even while the store is down
        assert_eq!(counter.increment(day(1)), 3);
        assert_eq!(counter.current(day(2)), 0);
    }
}
