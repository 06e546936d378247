//! Calendar-day source for the ledger.

use std::sync::{Mutex, PoisonError};

use chrono::{FixedOffset, Local, NaiveDate, Utc};

/// Supplies "today". Sampled once per request.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date, either the process-local zone or a pinned UTC offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock {
    offset: Option<FixedOffset>,
}

impl LocalClock {
    /// Use the host's local timezone.
    pub fn new() -> Self {
        Self { offset: None }
    }

    /// Use a fixed offset regardless of the host timezone.
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            offset: Some(offset),
        }
    }
}

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
            None => Local::now().date_naive(),
        }
    }
}

/// A clock stuck on a settable date, for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock().unwrap_or_else(PoisonError::into_inner) = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
