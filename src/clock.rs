use std::sync::{Mutex, PoisonError};

use time::{Duration, OffsetDateTime};

/// Source of record timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock, truncated to the microsecond precision the store keeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
            .unwrap_or(now)
    }
}

/// Hands out `start`, `start + step`, `start + 2 * step`, ...
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<OffsetDateTime>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: OffsetDateTime, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> OffsetDateTime {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let now = *next;
        *next = now + self.step;
        now
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn stepping_clock_advances_by_step() {
        let clock = SteppingClock::new(datetime!(2024-01-01 10:00 UTC), Duration::minutes(5));
        assert_eq!(clock.now(), datetime!(2024-01-01 10:00 UTC));
        assert_eq!(clock.now(), datetime!(2024-01-01 10:05 UTC));
        assert_eq!(clock.now(), datetime!(2024-01-01 10:10 UTC));
    }

    #[test]
    fn system_clock_drops_sub_microsecond_digits() {
        assert_eq!(SystemClock.now().nanosecond() % 1_000, 0);
    }
}
