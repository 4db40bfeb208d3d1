//! Evaluation clocks
//!
//! Queries are evaluated relative to "now". Alert evaluation and tests need
//! that instant to be injectable, so the engine never reads the wall clock
//! directly.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use parking_lot::RwLock;

/// Source of the evaluation instant
pub trait Clock: Send + Sync {
    /// Current evaluation instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to whole seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        now.duration_trunc(TimeDelta::seconds(1)).unwrap_or(now)
    }
}

/// Clock pinned to a settable instant
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock that always reports `instant`
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: RwLock::new(instant),
        }
    }

    /// Move the clock to a new instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.write() = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.read()
    }
}
