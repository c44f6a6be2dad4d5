//! Clock port - 時刻の抽象化
//!
//! - **SystemClock**: wall clock (`Utc::now()`)
//! - **MonotonicClock**: wall anchor + tokio monotonic elapsed. Follows tokio's
//!   paused time in tests, so minute-long pacing runs instantly.
//! - **FixedClock**: never moves (tests)

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};

/// Clock provides the current instant and the local calendar day.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar date used to key the daily quota.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

/// `at + duration`, saturating at the largest representable instant.
pub fn add_duration(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Wall-clock reading taken once, advanced by `tokio::time::Instant`.
///
/// Must be created inside a tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    wall: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        add_duration(self.wall, self.started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_does_not_move() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn add_duration_saturates() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            add_duration(at, Duration::from_secs(90)),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 30).unwrap()
        );
        assert_eq!(add_duration(at, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_tokio_time() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = MonotonicClock::anchored_at(at);
        tokio::time::advance(Duration::from_secs(300)).await;
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 5, 0).unwrap();
        assert_eq!(clock.now(), expected);
    }
}
