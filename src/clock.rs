//! Wall-clock sources.
//!
//! The engine consults the clock only to schedule the session-close pruner,
//! so the source is injectable: production uses [`SystemClock`], tests pin a
//! [`SimulatedClock`] just before the close so the session boundary can be
//! exercised in finite time.

use parking_lot::RwLock;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// A source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// The real system clock, in local time when the local offset is known.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}

/// A clock frozen at a settable instant. Time moves only through
/// [`SimulatedClock::set`] and [`SimulatedClock::advance`]; clones share the
/// same instant.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: Arc<RwLock<OffsetDateTime>>,
}

impl SimulatedClock {
    pub fn at(start: OffsetDateTime) -> Self {
        SimulatedClock {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.write() += by;
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn simulated_clock_is_frozen_until_advanced() {
        let clock = SimulatedClock::at(datetime!(2024-03-15 12:00:00 UTC));
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(clock.now(), first, "time must not move on its own");

        clock.advance(Duration::minutes(30));
        assert_eq!(clock.now(), datetime!(2024-03-15 12:30:00 UTC));
    }

    #[test]
    fn clones_share_the_same_instant() {
        let clock = SimulatedClock::at(datetime!(2024-03-15 12:00:00 UTC));
        let view = clock.clone();
        clock.set(datetime!(2024-03-16 09:00:00 UTC));
        assert_eq!(view.now(), datetime!(2024-03-16 09:00:00 UTC));
    }
}
