//! Wall-clock access for date rollover and reminder planning.
//!
//! Everything here works in device-local time. The ledger's day boundary is
//! local midnight, so a UTC date would roll the ledger over at the wrong
//! wall-clock moment for any non-zero offset.

use chrono::{Local, NaiveDate, NaiveDateTime};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub trait Clock {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    #[must_use]
    pub fn at(date: &str, time: &str) -> Option<Self> {
        let dt = NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").ok()?;
        Some(Self(dt))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}
