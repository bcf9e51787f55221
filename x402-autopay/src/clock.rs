//! Wall-clock access, injectable so time windows can be tested.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use chrono::{DateTime, Datelike, Utc};
use x402_autopay_core::types::EpochMillis;

pub trait Clock: Debug + Send + Sync {
    fn now_ms(&self) -> EpochMillis;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(now_ms: EpochMillis) -> Self {
        ManualClock(Arc::new(AtomicI64::new(now_ms)))
    }

    pub fn set(&self, now_ms: EpochMillis) {
        self.0.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by_ms: i64) {
        self.0.fetch_add(by_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> EpochMillis {
        self.0.load(Ordering::SeqCst)
    }
}

/// Whether two instants fall in the same UTC calendar month.
pub fn same_month(a: EpochMillis, b: EpochMillis) -> bool {
    match (
        DateTime::<Utc>::from_timestamp_millis(a),
        DateTime::<Utc>::from_timestamp_millis(b),
    ) {
        (Some(a), Some(b)) => a.year() == b.year() && a.month() == b.month(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ms(y: i32, m: u32, d: u32) -> EpochMillis {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn month_boundaries() {
        assert!(same_month(ms(2026, 3, 1), ms(2026, 3, 31)));
        assert!(!same_month(ms(2026, 3, 31), ms(2026, 4, 1)));
        assert!(!same_month(ms(2025, 3, 15), ms(2026, 3, 15)));
    }

    #[test]
    fn manual_clock_moves() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(10);
        assert_eq!(clock.clone().now_ms(), 10);
    }
}
