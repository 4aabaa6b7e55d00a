//! Wall-clock source for the module's date and time queries

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use std::sync::Arc;

/// Source of the local date and time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Minutes since midnight
    fn minutes(&self) -> i32 {
        let now = self.now();
        (now.hour() * 60 + now.minute()) as i32
    }

    fn day(&self) -> i32 {
        self.now().day() as i32
    }

    /// Month of the year, starting at 1
    fn month(&self) -> i32 {
        self.now().month() as i32
    }

    fn year(&self) -> i32 {
        self.now().year()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// The host's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant, for reproducible output
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Frozen at `hour:minute` on the given date; `None` if out of range
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_fields() {
        let clock = FixedClock::at(1982, 12, 3, 13, 45).unwrap();
        assert_eq!(clock.minutes(), 13 * 60 + 45);
        assert_eq!(clock.day(), 3);
        assert_eq!(clock.month(), 12);
        assert_eq!(clock.year(), 1982);
    }

    #[test]
    fn test_fixed_clock_rejects_invalid_dates() {
        assert!(FixedClock::at(2024, 2, 30, 0, 0).is_none());
        assert!(FixedClock::at(2024, 1, 1, 24, 0).is_none());
    }

    #[test]
    fn test_shared_clock() {
        let shared: Arc<dyn Clock> = Arc::new(FixedClock::at(2000, 1, 2, 0, 5).unwrap());
        assert_eq!(shared.minutes(), 5);
        assert_eq!(shared.clone().day(), 2);
    }

    #[test]
    fn test_system_clock_in_range() {
        let clock = SystemClock;
        assert!((0..24 * 60).contains(&clock.minutes()));
        assert!((1..=12).contains(&clock.month()));
    }
}
