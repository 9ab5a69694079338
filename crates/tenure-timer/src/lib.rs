//! Inactivity timer scheduling for Tenure.
//!
//! Two pieces:
//!
//! - [`InactivitySchedule`]: given a session's remaining lifetime and the
//!   desired warning lead time, when should the timer fire and how long
//!   should the warning last?
//! - [`TimerSlot`]: a single slot holding at most one live timer task.
//!   Arming always cancels whatever was there first, and every arm or
//!   cancel bumps a generation number so a completion that was already in
//!   flight when its timer was replaced can be recognized as stale.
//!
//! # Integration
//!
//! The slot is designed to sit inside the controller actor. The timer task
//! doesn't touch controller state; it just sends its generation back over
//! a channel and the actor decides whether it still matters:
//!
//! ```ignore
//! let generation = slot.arm(schedule.timeout, move |generation| async move {
//!     let _ = events.send(Event::TimerFired { generation });
//! });
//! // ... later, in the actor loop:
//! Event::TimerFired { generation } if slot.settle(generation) => { /* act */ }
//! Event::TimerFired { .. } => { /* stale, ignore */ }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// InactivitySchedule
// ---------------------------------------------------------------------------

/// When the inactivity timer fires, and how long the warning that may
/// follow it lasts.
///
/// ```text
/// timeout = max_age < lead ? max_age / 2 : max_age - lead
/// dialog  = max_age - timeout
/// ```
///
/// `timeout + dialog == max_age` always, so the warning ends exactly when
/// the server would expire the session. When the session has less life
/// left than the lead time, the lead time is compressed to half of what
/// remains instead of going to zero or negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InactivitySchedule {
    /// Delay from the last renewal until the timer fires.
    pub timeout: Duration,
    /// Length of the warning window after the timer fires.
    pub dialog: Duration,
}

impl InactivitySchedule {
    /// Computes the schedule from seconds.
    ///
    /// Negative or non-finite inputs are treated as zero.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tenure_timer::InactivitySchedule;
    ///
    /// let s = InactivitySchedule::compute(100.0, 30.0);
    /// assert_eq!(s.timeout, Duration::from_secs(70));
    /// assert_eq!(s.dialog, Duration::from_secs(30));
    ///
    /// let s = InactivitySchedule::compute(20.0, 30.0);
    /// assert_eq!(s.timeout, Duration::from_secs(10));
    /// assert_eq!(s.dialog, Duration::from_secs(10));
    /// ```
    pub fn compute(max_age_seconds: f64, auto_logout_seconds: f64) -> Self {
        let max_age = non_negative(max_age_seconds);
        let lead = non_negative(auto_logout_seconds);
        let timeout = if max_age < lead {
            max_age / 2.0
        } else {
            max_age - lead
        };
        Self {
            timeout: seconds(timeout),
            dialog: seconds(max_age - timeout),
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters for the single-timer invariant.
///
/// `armed == cancelled + settled + live`, with `live` at most 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Timers started.
    pub armed: u64,
    /// Live timers aborted before completing.
    pub cancelled: u64,
    /// Timers whose completion was accepted via [`TimerSlot::settle`].
    pub settled: u64,
    /// Completions rejected as stale.
    pub stale: u64,
}

impl TimerStats {
    /// Timers armed but neither cancelled nor settled.
    pub fn live(&self) -> u64 {
        self.armed - self.cancelled - self.settled
    }
}

// ---------------------------------------------------------------------------
// TimerSlot
// ---------------------------------------------------------------------------

/// Holds at most one live timer task.
///
/// Not thread-safe by itself; it's owned by a single actor task.
#[derive(Debug, Default)]
pub struct TimerSlot {
    current: Option<JoinHandle<()>>,
    /// Bumped on every arm and cancel. The live timer, if any, carries the
    /// current value.
    generation: u64,
    stats: TimerStats,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any live timer, then runs `on_fire(generation)` after
    /// `delay`. Returns the new timer's generation.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn arm<F, Fut>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn(move |generation| async move {
            tokio::time::sleep(delay).await;
            trace!(generation, "timer elapsed");
            on_fire(generation).await;
        })
    }

    /// Cancels any live timer, then spawns `task(generation)` immediately.
    ///
    /// Used for waits that aren't a plain delay (an open warning prompt),
    /// so they share the slot's one-at-a-time guarantee with the timer.
    pub fn spawn<F, Fut>(&mut self, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.current = Some(tokio::spawn(task(generation)));
        self.stats.armed += 1;
        debug!(generation, "timer armed");
        generation
    }

    /// Aborts the live timer, if any. Returns `true` if one was live.
    ///
    /// The generation moves on even if nothing was live, so a completion
    /// already queued by the old timer is rejected by [`settle`](Self::settle).
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        match self.current.take() {
            Some(handle) => {
                handle.abort();
                self.stats.cancelled += 1;
                debug!(generation = self.generation, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Accepts the completion of the timer with `generation`.
    ///
    /// Returns `true` (and empties the slot) only if `generation` is the
    /// live timer's. Anything else is stale.
    pub fn settle(&mut self, generation: u64) -> bool {
        if generation == self.generation && self.current.is_some() {
            self.current = None;
            self.stats.settled += 1;
            true
        } else {
            self.stats.stale += 1;
            trace!(
                generation,
                current = self.generation,
                "stale timer completion ignored"
            );
            false
        }
    }

    /// `true` while a timer is armed and not yet settled or cancelled.
    pub fn is_armed(&self) -> bool {
        self.current.is_some()
    }

    pub fn stats(&self) -> TimerStats {
        self.stats
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}
