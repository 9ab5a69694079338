//! A shared monotonic clock for activity and renewal marks.
//!
//! Both "last activity" and "last successful renewal" are stamped with the
//! same [`Clock`] so they can be compared directly. The clock is built on
//! `tokio::time::Instant`, which means `tokio::time::pause()` and
//! `advance()` move it in tests.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// A point in time, in microseconds since the owning [`Clock`] started.
///
/// Timestamps from different clocks are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock's start.
    pub const ZERO: Self = Self(0);

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Time elapsed from the clock's start.
    pub const fn since_start(self) -> Duration {
        Duration::from_micros(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{:.3}s", self.since_start().as_secs_f64())
    }
}

/// Hands out [`Timestamp`]s relative to a fixed start instant.
///
/// `Copy`, so the controller and the activity monitor each hold their own
/// copy of the same clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    /// Starts a clock at the current (possibly paused) Tokio instant.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        let micros = self.start.elapsed().as_micros();
        Timestamp(u64::try_from(micros).unwrap_or(u64::MAX))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_now_follows_paused_time() {
        let clock = Clock::new();
        assert_eq!(clock.now(), Timestamp::ZERO);

        tokio::time::advance(Duration::from_millis(1500)).await;

        assert_eq!(clock.now(), Timestamp::from_micros(1_500_000));
    }

    #[test]
    fn test_timestamp_display() {
        assert_eq!(Timestamp::from_micros(2_500_000).to_string(), "t+2.500s");
    }
}
