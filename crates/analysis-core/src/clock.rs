use chrono::{Local, NaiveDate};

/// Calendar used by the daily refresh and dedup policies.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Process-local calendar day.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to a settable day, for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    day: std::sync::Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: std::sync::Mutex::new(day),
        }
    }

    pub fn set(&self, day: NaiveDate) {
        if let Ok(mut guard) = self.day.lock() {
            *guard = day;
        }
    }

    /// Moves the calendar forward by `days`.
    pub fn advance_days(&self, days: i64) {
        if let Ok(mut guard) = self.day.lock() {
            *guard += chrono::Duration::days(days);
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        match self.day.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
