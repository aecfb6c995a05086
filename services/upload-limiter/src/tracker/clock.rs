use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{Local, Timelike, Utc};
use serde::Serialize;

use super::error::UsageError;
use super::HOURS_PER_DAY;

/// An hour of the day, always in `0..24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Hour(u8);

impl Hour {
    pub fn of<T: Timelike>(time: &T) -> Self {
        // chrono guarantees hour() < 24
        Self(time.hour() as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Hour> {
        (0..HOURS_PER_DAY as u8).map(Hour)
    }
}

impl TryFrom<u32> for Hour {
    type Error = UsageError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value as usize >= HOURS_PER_DAY {
            Err(UsageError::InvalidInput(format!(
                "hour must be between 0 and 23, got {value}"
            )))
        } else {
            Ok(Self(value as u8))
        }
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

/// Source of the current hour-of-day used to pick a bucket.
pub trait HourClock: Send + Sync {
    fn current_hour(&self) -> Hour;
}

/// Local wall-clock hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl HourClock for LocalClock {
    fn current_hour(&self) -> Hour {
        Hour::of(&Local::now())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UtcClock;

impl HourClock for UtcClock {
    fn current_hour(&self) -> Hour {
        Hour::of(&Utc::now())
    }
}

/// Clock pinned to a settable hour.
#[derive(Debug)]
pub struct FixedClock {
    hour: AtomicU8,
}

impl FixedClock {
    pub fn new(hour: Hour) -> Self {
        Self {
            hour: AtomicU8::new(hour.value()),
        }
    }

    pub fn set(&self, hour: Hour) {
        self.hour.store(hour.value(), Ordering::SeqCst);
    }
}

impl HourClock for FixedClock {
    fn current_hour(&self) -> Hour {
        Hour(self.hour.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockKind {
    #[default]
    Local,
    Utc,
}

impl ClockKind {
    pub fn build(self) -> Arc<dyn HourClock> {
        match self {
            ClockKind::Local => Arc::new(LocalClock),
            ClockKind::Utc => Arc::new(UtcClock),
        }
    }
}

impl FromStr for ClockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ClockKind::Local),
            "utc" => Ok(ClockKind::Utc),
            other => Err(format!("unknown hour clock: {other}")),
        }
    }
}
