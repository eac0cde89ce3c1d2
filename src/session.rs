//! Session boundary schedule for the day-order pruner.
//!
//! A trading session ends at a fixed wall-clock time each day. The pruner
//! asks this module for the next close instant relative to the injected
//! clock, waits until then plus a small grace buffer, and cancels every
//! resting GoodForDay order.

use crate::config::SessionConfig;
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::{format_description, time};
use time::{Duration, OffsetDateTime, Time};

const CLOSE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("could not parse session close time {0:?} as HH:MM")]
    /// The configured close time is not a valid HH:MM wall-clock time.
    InvalidCloseTime(String, #[source] time::error::Parse),
}

/// End-of-session schedule: a daily close time and the grace buffer the
/// pruner waits past the close before scanning.
#[derive(Debug, Copy, Clone)]
pub struct SessionSchedule {
    close: Time,
    grace: Duration,
}

impl SessionSchedule {
    pub fn new(close: Time, grace: Duration) -> Self {
        SessionSchedule { close, grace }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let close = Time::parse(&config.close, CLOSE_FORMAT)
            .map_err(|source| SessionError::InvalidCloseTime(config.close.clone(), source))?;
        Ok(SessionSchedule::new(
            close,
            Duration::milliseconds(config.grace as i64),
        ))
    }

    /// The first close instant strictly after `now`: today's close, or the
    /// next day's when today's has already passed.
    pub fn next_close_after(&self, now: OffsetDateTime) -> OffsetDateTime {
        let close_today = now.replace_time(self.close);
        if now >= close_today {
            close_today + Duration::days(1)
        } else {
            close_today
        }
    }

    /// How long the pruner should sleep from `now` before scanning: the time
    /// to the next close plus the grace buffer.
    pub fn until_close(&self, now: OffsetDateTime) -> std::time::Duration {
        let wait = self.next_close_after(now) - now + self.grace;
        wait.try_into().unwrap_or(std::time::Duration::ZERO)
    }
}

impl Default for SessionSchedule {
    fn default() -> Self {
        SessionSchedule::new(time!(16:00), Duration::milliseconds(100))
    }
}
