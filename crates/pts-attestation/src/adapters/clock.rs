//! System wall-clock adapter.

use chrono::{DateTime, Utc};

use crate::ports::outbound::Clock;

/// [`Clock`] backed by the operating-system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        Some(Utc::now())
    }
}
