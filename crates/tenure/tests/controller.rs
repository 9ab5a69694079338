//! Integration tests for the session controller.
//!
//! Every test runs on paused Tokio time: sleeps complete as soon as all
//! tasks are idle, so a 70-second inactivity timer fires instantly and
//! deterministically.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tenure::prelude::*;
use tenure::{ActivityEmitter, ErrorCategory, Timestamp};
use tokio::sync::mpsc;

// =========================================================================
// Mock backend
// =========================================================================

const PASSWORD: &str = "secret";

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create(String),
    Renew(String),
    Revoke(String),
}

#[derive(Debug)]
struct MockState {
    /// Lifetime handed out by create and renew.
    max_age: f64,
    /// Sessions the "server" still considers valid.
    live: HashSet<String>,
    renew_delay: Duration,
    next_id: u32,
    calls: Vec<Call>,
}

/// An in-memory session server. Clones share state.
#[derive(Debug, Clone)]
struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    fn new(max_age: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                max_age,
                live: HashSet::new(),
                renew_delay: Duration::ZERO,
                next_id: 1,
                calls: Vec::new(),
            })),
        }
    }

    fn with_live_session(self, id: &str) -> Self {
        self.state.lock().unwrap().live.insert(id.to_string());
        self
    }

    fn set_max_age(&self, max_age: f64) {
        self.state.lock().unwrap().max_age = max_age;
    }

    fn set_renew_delay(&self, delay: Duration) {
        self.state.lock().unwrap().renew_delay = delay;
    }

    /// Expires a session on the server side.
    fn expire(&self, id: &str) {
        self.state.lock().unwrap().live.remove(id);
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn renew_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Renew(_)))
            .count()
    }
}

impl SessionBackend for MockBackend {
    async fn create(
        &self,
        credentials: &Credentials,
    ) -> Result<SessionInfo, ErrorList> {
        let mut state = self.state.lock().unwrap();
        let login_id = credentials
            .get(Credentials::LOGIN_ID)
            .unwrap_or_default()
            .to_string();
        state.calls.push(Call::Create(login_id));

        if credentials.get(Credentials::PASSWORD) != Some(PASSWORD) {
            return Err(ErrorList::new()
                .add(AppError::for_widget("invalid password", "pw"))
                .add(AppError::new("login failed")));
        }
        let id = format!("s-{}", state.next_id);
        state.next_id += 1;
        state.live.insert(id.clone());
        Ok(SessionInfo::new(id, state.max_age))
    }

    async fn renew(&self, session_id: &str) -> Result<SessionInfo, ErrorList> {
        let delay = self.state.lock().unwrap().renew_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Renew(session_id.to_string()));
        if state.live.contains(session_id) {
            Ok(SessionInfo::new(session_id, state.max_age))
        } else {
            Err(AppError::new("Not Found").into())
        }
    }

    async fn revoke(&self, session_id: &str) -> Result<(), ErrorList> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Revoke(session_id.to_string()));
        state.live.remove(session_id);
        Ok(())
    }
}

// =========================================================================
// Harness
// =========================================================================

const KEY: &str = "sessionId";

struct Harness {
    handle: SessionHandle,
    backend: MockBackend,
    store: MemoryTokenStore,
    events: mpsc::UnboundedReceiver<PresenterEvent>,
}

impl Harness {
    fn drain_events(&mut self) -> Vec<PresenterEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    async fn snapshot(&self) -> ControllerSnapshot {
        self.handle.snapshot().await.expect("controller running")
    }
}

fn config() -> SessionConfig {
    SessionConfig {
        base_url: "http://unused".into(),
        session_id_key: KEY.into(),
        auto_logout_seconds: 30.0,
    }
}

fn spawn_with<W: WarningPrompt>(
    builder: SessionControllerBuilder,
    backend: MockBackend,
    store: MemoryTokenStore,
    prompt: W,
) -> Harness {
    let (presenter, events) = ChannelPresenter::new();
    let handle =
        builder.spawn(backend.clone(), store.clone(), presenter, prompt);
    Harness {
        handle,
        backend,
        store,
        events,
    }
}

/// A controller with a channel prompt. Returns the warning receiver too.
fn harness(
    backend: MockBackend,
) -> (Harness, mpsc::Receiver<WarningRequest>) {
    let (prompt, warnings) = ChannelWarningPrompt::new(4);
    let harness = spawn_with(
        SessionControllerBuilder::new(config()),
        backend,
        MemoryTokenStore::new(),
        prompt,
    );
    (harness, warnings)
}

/// Lets spawned tasks run to quiescence.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Sleeps in paused time. Half seconds keep reads clear of the
/// warning countdown's whole-second ticks.
async fn sleep_secs(secs: f64) {
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

fn credentials() -> Credentials {
    Credentials::new("alice", PASSWORD)
}

fn logged_in_events(events: &[PresenterEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PresenterEvent::LoggedIn(_)))
        .count()
}

// =========================================================================
// Attach
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_attach_without_token_enters_logged_out() {
    let (mut h, _warnings) = harness(MockBackend::new(100.0));

    let state = h.handle.attach().await.unwrap();

    assert_eq!(state, LifecycleState::LoggedOut);
    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);
    assert!(h.backend.calls().is_empty(), "no token, no backend call");
    assert!(!h.snapshot().await.timer_armed);
}

#[tokio::test(start_paused = true)]
async fn test_attach_with_live_token_logs_in() {
    let backend = MockBackend::new(100.0).with_live_session("s-9");
    let (mut h, _warnings) = harness(backend);
    h.store.set(KEY, "s-9");

    let state = h.handle.attach().await.unwrap();

    assert_eq!(state, LifecycleState::LoggedIn);
    assert_eq!(
        h.drain_events(),
        vec![PresenterEvent::LoggedIn(SessionInfo::new("s-9", 100.0))]
    );
    let snapshot = h.snapshot().await;
    assert!(snapshot.timer_armed);
    assert_eq!(snapshot.last_check_time, Some(Timestamp::ZERO));
}

#[tokio::test(start_paused = true)]
async fn test_attach_with_expired_token_discards_it() {
    let (mut h, _warnings) = harness(MockBackend::new(100.0));
    h.store.set(KEY, "stale");

    let state = h.handle.attach().await.unwrap();

    assert_eq!(state, LifecycleState::LoggedOut);
    assert_eq!(h.store.get(KEY), None);
    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);
    assert_eq!(h.snapshot().await.session_info, None);
}

// =========================================================================
// check_login
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_check_login_twice_announces_once() {
    let backend = MockBackend::new(100.0).with_live_session("s-1");
    let (mut h, _warnings) = harness(backend);
    h.store.set(KEY, "s-1");

    let first = h.handle.check_login().await.unwrap();
    let second = h.handle.check_login().await.unwrap();

    assert_eq!(first, LifecycleState::LoggedIn);
    assert_eq!(second, LifecycleState::LoggedIn);
    assert_eq!(logged_in_events(&h.drain_events()), 1);

    let stats = h.snapshot().await.timer_stats;
    assert_eq!(stats.armed, 2);
    assert_eq!(stats.live(), 1, "re-arming replaces the first timer");
}

#[tokio::test(start_paused = true)]
async fn test_check_login_concurrent_callers_leave_one_timer() {
    let backend = MockBackend::new(100.0).with_live_session("s-1");
    backend.set_renew_delay(Duration::from_secs(1));
    let (mut h, _warnings) = harness(backend);
    h.store.set(KEY, "s-1");

    let a = h.handle.clone();
    let b = h.handle.clone();
    let (ra, rb) = tokio::join!(a.check_login(), b.check_login());

    assert_eq!(ra.unwrap(), LifecycleState::LoggedIn);
    assert_eq!(rb.unwrap(), LifecycleState::LoggedIn);
    assert_eq!(logged_in_events(&h.drain_events()), 1);
    assert!(h.snapshot().await.timer_stats.live() <= 1);
}

// =========================================================================
// login
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_login_stores_token_and_logs_in() {
    let (mut h, _warnings) = harness(MockBackend::new(100.0));
    h.handle.attach().await.unwrap();

    let state = h.handle.login(credentials()).await.unwrap();

    assert_eq!(state, LifecycleState::LoggedIn);
    assert_eq!(h.store.get(KEY).as_deref(), Some("s-1"));
    assert_eq!(
        h.backend.calls(),
        vec![Call::Create("alice".into()), Call::Renew("s-1".into())]
    );
    assert_eq!(
        h.drain_events(),
        vec![
            PresenterEvent::LoggedOut,
            PresenterEvent::LoggedIn(SessionInfo::new("s-1", 100.0)),
        ]
    );
}

// Scenario E
#[tokio::test(start_paused = true)]
async fn test_login_bad_credentials_reports_widget_errors() {
    let (mut h, _warnings) = harness(MockBackend::new(100.0));
    h.handle.attach().await.unwrap();
    h.drain_events();

    let state = h
        .handle
        .login(Credentials::new("alice", "wrong"))
        .await
        .unwrap();

    assert_eq!(state, LifecycleState::LoggedOut);
    assert_eq!(h.store.get(KEY), None);

    let events = h.drain_events();
    assert_eq!(events.len(), 1, "errors only, no re-announced logout");
    let PresenterEvent::Errors(errors) = &events[0] else {
        panic!("expected errors, got {events:?}");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(errors.for_widget("pw").count(), 1);
    assert_eq!(errors.generic(&["loginId", "pw"]).count(), 1);
}

// =========================================================================
// Inactivity timer
// =========================================================================

// Scenario A
#[tokio::test(start_paused = true)]
async fn test_timer_with_activity_renews_silently() {
    let (mut h, mut warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    sleep_secs(10.0).await;
    h.handle.record_activity(ActivityKind::KeyDown);
    h.backend.set_max_age(50.0);

    // Timer at 70s (100 - 30).
    sleep_secs(60.5).await;

    assert!(warnings.try_recv().is_err(), "no warning when active");
    assert_eq!(h.backend.renew_count(), 2);
    assert!(h.drain_events().is_empty(), "silent renewal");

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, LifecycleState::LoggedIn);
    assert_eq!(snapshot.session_info.map(|i| i.max_age_seconds), Some(50.0));
    let renewed_at = snapshot.last_check_time.unwrap().since_start();
    assert!(renewed_at >= Duration::from_secs(70));
    assert!(renewed_at < Duration::from_secs(71));
    assert!(snapshot.timer_armed);

    // The fresh timer uses the new lifetime: 50 - 30 = 20s after 70s.
    sleep_secs(19.0).await;
    assert!(warnings.try_recv().is_err());
    sleep_secs(1.0).await;
    let warning = warnings.try_recv().expect("idle since 70s, warning at 90s");
    assert_eq!(warning.remaining_seconds(), 30);
}

#[tokio::test(start_paused = true)]
async fn test_timer_activity_from_source_counts() {
    let backend = MockBackend::new(100.0);
    let (emitter, source) = ChannelActivitySource::new();
    let (prompt, mut warnings) = ChannelWarningPrompt::new(4);
    let h = spawn_with(
        SessionControllerBuilder::new(config()).activity_source(source),
        backend,
        MemoryTokenStore::new(),
        prompt,
    );
    h.handle.login(credentials()).await.unwrap();

    sleep_secs(30.0).await;
    assert!(emitter.emit(ActivityKind::PointerMove));
    sleep_secs(40.5).await;

    assert!(warnings.try_recv().is_err());
    assert_eq!(h.backend.renew_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timer_renewal_rejected_logs_out_without_errors() {
    let (mut h, mut warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    sleep_secs(5.0).await;
    h.handle.record_activity(ActivityKind::Scroll);
    h.backend.expire("s-1");
    sleep_secs(65.5).await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, LifecycleState::LoggedOut);
    assert_eq!(snapshot.session_info, None);
    assert!(!snapshot.timer_armed);
    assert_eq!(h.store.get(KEY), None);
    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);
    assert!(warnings.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_timer_short_session_halves_lifetime() {
    let (h, mut warnings) = harness(MockBackend::new(20.0));
    h.handle.login(credentials()).await.unwrap();

    sleep_secs(9.5).await;
    assert!(warnings.try_recv().is_err());
    sleep_secs(1.0).await;

    let warning = warnings.try_recv().expect("warning at 10s");
    assert_eq!(warning.dialog(), Duration::from_secs(10));
    assert_eq!(h.handle.state().await.unwrap(), LifecycleState::WarningPending);
}

#[tokio::test(start_paused = true)]
async fn test_timer_zero_lifetime_logs_out_without_warning() {
    let (mut h, mut warnings) = harness(MockBackend::new(0.0));
    h.handle.login(credentials()).await.unwrap();

    settle().await;

    assert_eq!(h.handle.state().await.unwrap(), LifecycleState::LoggedOut);
    assert!(warnings.try_recv().is_err());
    assert!(h.backend.calls().contains(&Call::Revoke("s-1".into())));
    assert_eq!(h.drain_events().last(), Some(&PresenterEvent::LoggedOut));
}

// =========================================================================
// Warning outcomes
// =========================================================================

// Scenario B
#[tokio::test(start_paused = true)]
async fn test_warning_logout_revokes_and_clears() {
    let (mut h, mut warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    sleep_secs(70.5).await;
    assert_eq!(h.handle.state().await.unwrap(), LifecycleState::WarningPending);
    let warning = warnings.try_recv().expect("idle, so warning opens");
    assert_eq!(warning.remaining_seconds(), 30);

    assert!(warning.respond(PromptChoice::Logout));
    settle().await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, LifecycleState::LoggedOut);
    assert_eq!(snapshot.session_info, None);
    assert_eq!(snapshot.timer_stats.live(), 0);
    assert_eq!(h.store.get(KEY), None);
    assert_eq!(h.backend.calls().last(), Some(&Call::Revoke("s-1".into())));
    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);
}

#[tokio::test(start_paused = true)]
async fn test_warning_countdown_expiry_logs_out() {
    let (mut h, mut warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    sleep_secs(70.5).await;
    let _warning = warnings.try_recv().expect("warning open");
    sleep_secs(29.0).await;
    assert_eq!(h.handle.state().await.unwrap(), LifecycleState::WarningPending);
    sleep_secs(1.0).await;

    assert_eq!(h.handle.state().await.unwrap(), LifecycleState::LoggedOut);
    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);
}

// Scenario C
#[tokio::test(start_paused = true)]
async fn test_warning_continue_renews_and_rearms() {
    let (mut h, mut warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    sleep_secs(70.5).await;
    let warning = warnings.try_recv().expect("warning open");
    assert!(warning.responder().dismiss());
    settle().await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, LifecycleState::LoggedIn);
    assert!(snapshot.timer_armed);
    assert_eq!(snapshot.timer_stats.live(), 1);
    assert_eq!(h.backend.renew_count(), 2);
    assert_eq!(h.store.get(KEY).as_deref(), Some("s-1"));
    assert!(h.drain_events().is_empty(), "already announced as logged in");

    // Re-armed from the renewal at 70.5s: next warning at 140.5s.
    sleep_secs(69.5).await;
    assert!(warnings.try_recv().is_err());
    sleep_secs(1.0).await;
    assert!(warnings.try_recv().is_ok());
}

// Scenario D
#[tokio::test(start_paused = true)]
async fn test_warning_unavailable_reports_and_stops_timer() {
    let mut h = spawn_with(
        SessionControllerBuilder::new(config()),
        MockBackend::new(100.0),
        MemoryTokenStore::new(),
        UnavailablePrompt,
    );
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    sleep_secs(70.5).await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, LifecycleState::LoggedIn);
    assert!(!snapshot.timer_armed, "no new timer");

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    let PresenterEvent::Errors(errors) = &events[0] else {
        panic!("expected errors, got {events:?}");
    };
    let error = errors.iter().next().unwrap();
    assert_eq!(error.options.category, Some(ErrorCategory::Capability));

    // Nothing else happens on its own.
    sleep_secs(600.0).await;
    assert_eq!(h.backend.renew_count(), 1);
    assert!(h.drain_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_warning_renderer_gone_is_capability_unavailable() {
    let (mut h, warnings) = harness(MockBackend::new(100.0));
    drop(warnings);
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    sleep_secs(70.5).await;

    assert_eq!(h.handle.state().await.unwrap(), LifecycleState::LoggedIn);
    assert!(matches!(
        h.drain_events().as_slice(),
        [PresenterEvent::Errors(_)]
    ));
}

// =========================================================================
// logout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_logout_cancels_timer_and_revokes() {
    let (mut h, mut warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    let state = h.handle.logout().await.unwrap();

    assert_eq!(state, LifecycleState::LoggedOut);
    assert_eq!(h.backend.calls().last(), Some(&Call::Revoke("s-1".into())));
    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);

    sleep_secs(200.0).await;
    assert!(warnings.try_recv().is_err(), "cancelled timer never fires");
    assert_eq!(h.snapshot().await.timer_stats.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_logout_twice_announces_once() {
    let (mut h, _warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();

    h.handle.logout().await.unwrap();
    h.handle.logout().await.unwrap();

    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);
}

#[tokio::test(start_paused = true)]
async fn test_logout_while_warning_open_withdraws_it() {
    let (mut h, mut warnings) = harness(MockBackend::new(100.0));
    h.handle.login(credentials()).await.unwrap();
    h.drain_events();
    sleep_secs(70.5).await;
    let mut warning = warnings.try_recv().expect("warning open");

    // Another holder of the handle (a logout button) logs out.
    let button = h.handle.clone();
    assert_eq!(button.logout().await.unwrap(), LifecycleState::LoggedOut);

    assert_eq!(warning.next_tick().await, None);
    assert!(!warning.respond(PromptChoice::Continue));
    settle().await;
    assert_eq!(h.handle.state().await.unwrap(), LifecycleState::LoggedOut);
    assert_eq!(h.drain_events(), vec![PresenterEvent::LoggedOut]);
}

#[tokio::test(start_paused = true)]
async fn test_logout_during_inflight_renew_wins() {
    let backend = MockBackend::new(100.0).with_live_session("s-1");
    let (mut h, _warnings) = harness(backend.clone());
    h.store.set(KEY, "s-1");
    backend.set_renew_delay(Duration::from_secs(5));

    let checker = h.handle.clone();
    let check = tokio::spawn(async move { checker.check_login().await });
    settle().await;
    let logout = h.handle.logout().await.unwrap();

    assert_eq!(check.await.unwrap().unwrap(), LifecycleState::LoggedIn);
    assert_eq!(logout, LifecycleState::LoggedOut);

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, LifecycleState::LoggedOut);
    assert_eq!(snapshot.session_info, None);
    assert_eq!(snapshot.timer_stats.live(), 0);
    assert_eq!(h.store.get(KEY), None);
    assert_eq!(
        h.drain_events(),
        vec![
            PresenterEvent::LoggedIn(SessionInfo::new("s-1", 100.0)),
            PresenterEvent::LoggedOut,
        ]
    );
}

// =========================================================================
// Dispose
// =========================================================================

fn harness_with_emitter() -> (Harness, ActivityEmitter) {
    let (emitter, source) = ChannelActivitySource::new();
    let h = spawn_with(
        SessionControllerBuilder::new(config()).activity_source(source),
        MockBackend::new(100.0),
        MemoryTokenStore::new(),
        UnavailablePrompt,
    );
    (h, emitter)
}

#[tokio::test(start_paused = true)]
async fn test_dispose_stops_timer_and_listener() {
    let (h, emitter) = harness_with_emitter();
    h.handle.login(credentials()).await.unwrap();

    h.handle.dispose().await.unwrap();
    settle().await;

    assert!(h.handle.is_stopped());
    assert!(!emitter.emit(ActivityKind::KeyDown));
    assert!(matches!(
        h.handle.state().await,
        Err(TenureError::ControllerStopped)
    ));
    // The session itself survives for the next controller.
    assert_eq!(h.store.get(KEY).as_deref(), Some("s-1"));

    sleep_secs(200.0).await;
    assert_eq!(h.backend.renew_count(), 1, "timer never fired");
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_controller() {
    let (h, emitter) = harness_with_emitter();
    let Harness { handle, .. } = h;

    drop(handle);
    settle().await;

    assert!(!emitter.emit(ActivityKind::KeyDown));
}

#[tokio::test(start_paused = true)]
async fn test_new_controller_resumes_stored_session() {
    let backend = MockBackend::new(100.0);
    let store = MemoryTokenStore::new();
    let first = spawn_with(
        SessionControllerBuilder::new(config()),
        backend.clone(),
        store.clone(),
        UnavailablePrompt,
    );
    first.handle.login(credentials()).await.unwrap();
    first.handle.dispose().await.unwrap();

    let second = spawn_with(
        SessionControllerBuilder::new(config()),
        backend,
        store,
        UnavailablePrompt,
    );

    assert_eq!(
        second.handle.attach().await.unwrap(),
        LifecycleState::LoggedIn
    );
}
