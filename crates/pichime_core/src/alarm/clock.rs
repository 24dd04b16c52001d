//! Wall-clock source for the control loop.

use chrono::{Local, NaiveDateTime, Timelike};

pub trait Clock {
    /// Current local civil time, whole seconds.
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}
