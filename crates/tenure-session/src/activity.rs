//! User-activity tracking.
//!
//! The controller never resets its timer when the user does something.
//! It only asks, when the timer fires, "has there been any activity since
//! the last renewal?". So all this module has to keep is the latest
//! activity timestamp, and it has to keep it correctly no matter how many
//! events arrive or in what order.
//!
//! # Design
//!
//! [`ActivityMonitor`] stores the latest timestamp in an `AtomicU64`
//! updated with `fetch_max`. That makes recording:
//! - **monotonic**: a late-arriving older event can't move the mark back
//! - **commutative**: any interleaving of events ends at the same max
//! - **lock-free**: activity never waits on the controller, even while
//!   the controller is blocked on a backend call
//!
//! Events come from an injected [`ActivitySource`]. The monitor pumps the
//! source in a background task for as long as the returned
//! [`ActivityListener`] is alive; only dropping (or stopping) the
//! listener ends it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::{Clock, Timestamp};

/// Encoded value meaning "no activity yet". Real timestamps are stored
/// offset by one so that activity at `Timestamp::ZERO` is still visible.
const NEVER: u64 = 0;

// ---------------------------------------------------------------------------
// ActivityKind
// ---------------------------------------------------------------------------

/// The interaction signals that count as "the user is here".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    KeyDown,
    PointerDown,
    PointerMove,
    Scroll,
}

impl ActivityKind {
    /// Every kind, in a fixed order.
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::KeyDown,
        ActivityKind::PointerDown,
        ActivityKind::PointerMove,
        ActivityKind::Scroll,
    ];
}

// ---------------------------------------------------------------------------
// ActivityMonitor
// ---------------------------------------------------------------------------

/// Remembers when the user was last active.
///
/// Cheap to clone; clones share the same mark.
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    inner: Arc<MonitorInner>,
}

#[derive(Debug)]
struct MonitorInner {
    clock: Clock,
    last: AtomicU64,
    observed: AtomicU64,
}

impl ActivityMonitor {
    pub fn new(clock: Clock) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                clock,
                last: AtomicU64::new(NEVER),
                observed: AtomicU64::new(0),
            }),
        }
    }

    /// Records an interaction happening now. Returns the timestamp used.
    pub fn record(&self, kind: ActivityKind) -> Timestamp {
        let now = self.inner.clock.now();
        trace!(?kind, at = %now, "activity observed");
        self.record_at(now);
        now
    }

    /// Records an interaction at an explicit time.
    ///
    /// The stored mark becomes `max(previous, at)`.
    pub fn record_at(&self, at: Timestamp) {
        let encoded = at.as_micros().saturating_add(1);
        self.inner.last.fetch_max(encoded, Ordering::AcqRel);
        self.inner.observed.fetch_add(1, Ordering::Relaxed);
    }

    /// The latest recorded activity, or `None` if there hasn't been any.
    pub fn last_activity(&self) -> Option<Timestamp> {
        match self.inner.last.load(Ordering::Acquire) {
            NEVER => None,
            encoded => Some(Timestamp::from_micros(encoded - 1)),
        }
    }

    /// `true` if any activity was recorded strictly after `mark`.
    pub fn active_since(&self, mark: Timestamp) -> bool {
        self.last_activity().is_some_and(|last| last > mark)
    }

    /// Total number of events recorded (not deduplicated).
    pub fn observed(&self) -> u64 {
        self.inner.observed.load(Ordering::Relaxed)
    }

    /// The clock this monitor stamps events with.
    pub fn clock(&self) -> Clock {
        self.inner.clock
    }

    /// Starts pumping `source` into this monitor.
    ///
    /// Must be called from inside a Tokio runtime. The returned listener
    /// stops the pump when dropped.
    pub fn listen<S: ActivitySource>(&self, mut source: S) -> ActivityListener {
        let monitor = self.clone();
        let task = tokio::spawn(async move {
            while let Some(kind) = source.next_activity().await {
                monitor.record(kind);
            }
            debug!("activity source exhausted");
        });
        debug!("activity listener registered");
        ActivityListener { task: Some(task) }
    }
}

// ---------------------------------------------------------------------------
// ActivitySource
// ---------------------------------------------------------------------------

/// Where interaction events come from.
///
/// A UI host implements this over its input events; tests use
/// [`ChannelActivitySource`] to inject events deterministically.
pub trait ActivitySource: Send + 'static {
    /// Waits for the next interaction. `None` means the source is closed
    /// and no more events will come.
    fn next_activity(
        &mut self,
    ) -> impl Future<Output = Option<ActivityKind>> + Send;
}

/// An [`ActivitySource`] fed through an unbounded channel.
///
/// ```rust
/// # async fn demo() {
/// use tenure_session::{ActivityKind, ActivityMonitor, ChannelActivitySource, Clock};
///
/// let monitor = ActivityMonitor::new(Clock::new());
/// let (emitter, source) = ChannelActivitySource::new();
/// let _listener = monitor.listen(source);
///
/// emitter.emit(ActivityKind::KeyDown);
/// # }
/// ```
#[derive(Debug)]
pub struct ChannelActivitySource {
    receiver: mpsc::UnboundedReceiver<ActivityKind>,
}

impl ChannelActivitySource {
    /// Creates a source and the emitter that feeds it.
    pub fn new() -> (ActivityEmitter, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ActivityEmitter { sender }, Self { receiver })
    }
}

impl ActivitySource for ChannelActivitySource {
    async fn next_activity(&mut self) -> Option<ActivityKind> {
        self.receiver.recv().await
    }
}

/// The sending side of a [`ChannelActivitySource`]. Clone freely.
#[derive(Debug, Clone)]
pub struct ActivityEmitter {
    sender: mpsc::UnboundedSender<ActivityKind>,
}

impl ActivityEmitter {
    /// Forwards an interaction. Returns `false` once the listener is gone.
    pub fn emit(&self, kind: ActivityKind) -> bool {
        self.sender.send(kind).is_ok()
    }
}

// ---------------------------------------------------------------------------
// ActivityListener
// ---------------------------------------------------------------------------

/// Registration handle for a running activity pump.
///
/// Dropping it unregisters the listener.
#[derive(Debug)]
pub struct ActivityListener {
    task: Option<JoinHandle<()>>,
}

impl ActivityListener {
    /// Unregisters the listener now.
    pub fn stop(mut self) {
        self.abort();
    }

    /// `true` while the pump task is still running.
    pub fn is_listening(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("activity listener unregistered");
        }
    }
}

impl Drop for ActivityListener {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ts(micros: u64) -> Timestamp {
        Timestamp::from_micros(micros)
    }

    #[test]
    fn test_last_activity_starts_as_never() {
        let monitor = ActivityMonitor::new(Clock::new());

        assert_eq!(monitor.last_activity(), None);
        assert!(!monitor.active_since(Timestamp::ZERO));
    }

    #[test]
    fn test_record_at_zero_is_visible() {
        let monitor = ActivityMonitor::new(Clock::new());

        monitor.record_at(Timestamp::ZERO);

        assert_eq!(monitor.last_activity(), Some(Timestamp::ZERO));
    }

    #[test]
    fn test_record_at_keeps_maximum_for_any_order() {
        // Every permutation of the same events ends at the same mark.
        let events = [ts(40), ts(7), ts(93), ts(93), ts(12)];
        let orders: [[usize; 5]; 4] =
            [[0, 1, 2, 3, 4], [4, 3, 2, 1, 0], [2, 0, 4, 1, 3], [1, 2, 0, 4, 3]];

        for order in orders {
            let monitor = ActivityMonitor::new(Clock::new());
            let mut max_so_far = None;
            for i in order {
                monitor.record_at(events[i]);
                max_so_far = max_so_far.max(Some(events[i]));
                assert_eq!(monitor.last_activity(), max_so_far);
            }
            assert_eq!(monitor.last_activity(), Some(ts(93)));
            assert_eq!(monitor.observed(), 5);
        }
    }

    #[test]
    fn test_active_since_is_strict() {
        let monitor = ActivityMonitor::new(Clock::new());
        monitor.record_at(ts(500));

        assert!(monitor.active_since(ts(499)));
        assert!(!monitor.active_since(ts(500)));
        assert!(!monitor.active_since(ts(501)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_uses_clock_time() {
        let monitor = ActivityMonitor::new(Clock::new());
        tokio::time::advance(Duration::from_secs(3)).await;

        let at = monitor.record(ActivityKind::Scroll);

        assert_eq!(at, ts(3_000_000));
        assert_eq!(monitor.last_activity(), Some(at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_records_emitted_events() {
        let monitor = ActivityMonitor::new(Clock::new());
        let (emitter, source) = ChannelActivitySource::new();
        let listener = monitor.listen(source);

        tokio::time::advance(Duration::from_secs(2)).await;
        for kind in ActivityKind::ALL {
            assert!(emitter.emit(kind));
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(monitor.observed(), 4);
        assert_eq!(monitor.last_activity(), Some(ts(2_000_000)));
        assert!(listener.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_unregisters_listener() {
        let monitor = ActivityMonitor::new(Clock::new());
        let (emitter, source) = ChannelActivitySource::new();
        let listener = monitor.listen(source);

        listener.stop();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!emitter.emit(ActivityKind::KeyDown));
        assert_eq!(monitor.observed(), 0);
    }
}
