//! The session controller actor and its handle.
//!
//! The controller runs as a single Tokio task that owns every piece of
//! lifecycle state: the current [`SessionInfo`], the renewal mark, the
//! inactivity timer, and the record of what the presenter was last told.
//! The outside world talks to it through a cloneable [`SessionHandle`].
//!
//! ```text
//!  SessionHandle ──Command──▶ ┌──────────────────────┐ ──▶ SessionBackend
//!  SessionHandle ──Command──▶ │   controller task    │ ──▶ TokenStore
//!                             │ (one command/event   │ ──▶ Presenter
//!   timer task ────Event────▶ │  at a time)          │
//!   prompt task ───Event────▶ └──────────────────────┘
//! ```
//!
//! # Ordering
//!
//! Commands are handled strictly one after another, and backend calls are
//! awaited inside the handler. A `logout` issued while a renewal is in
//! flight is queued and runs after the renewal settles, so the renewal can
//! never resurrect a session that was just logged out.
//!
//! The timer and the warning prompt run in their own tasks and report back
//! over an internal channel. Each report carries the generation of the
//! [`TimerSlot`] that started it, and anything started before the most
//! recent arm or cancel is ignored.
//!
//! # States
//!
//! ```text
//!            login / check_login ok
//!  LoggedOut ──────────────────────▶ LoggedIn ◀───────────┐
//!      ▲                              │   ▲  activity:     │ continue /
//!      │ logout / renewal failed      │   └─ silent renew  │ prompt unavailable
//!      │                              ▼ timer, idle         │
//!      └────────────────────── WarningPending ─────────────┘
//!            logout / countdown
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenure_backend::SessionBackend;
use tenure_prompt::{PromptChoice, PromptError, WarningPrompt};
use tenure_protocol::{Credentials, ErrorList, SessionInfo};
use tenure_session::{
    ActivityKind, ActivityListener, ActivityMonitor, Clock, SessionConfig,
    Timestamp, TokenStore,
};
use tenure_timer::{InactivitySchedule, TimerSlot, TimerStats};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{Presenter, TenureError};

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// Where the controller is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    /// No valid session. The host shows the login form.
    LoggedOut,
    /// A renewed session with the inactivity timer armed.
    LoggedIn,
    /// The timer fired with no activity since the last renewal, and the
    /// warning prompt is open. Never terminal: it always resolves back to
    /// `LoggedIn` or on to `LoggedOut`.
    WarningPending,
}

impl LifecycleState {
    /// `true` in both states that hold a session.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::WarningPending)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "LoggedOut"),
            Self::LoggedIn => write!(f, "LoggedIn"),
            Self::WarningPending => write!(f, "WarningPending"),
        }
    }
}

/// A point-in-time view of the controller, for hosts and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub state: LifecycleState,
    pub session_info: Option<SessionInfo>,
    /// When the session was last renewed successfully.
    pub last_check_time: Option<Timestamp>,
    /// When the user was last active.
    pub last_activity: Option<Timestamp>,
    /// `true` while the inactivity timer or the warning prompt is live.
    pub timer_armed: bool,
    pub timer_stats: TimerStats,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<T>;

/// Requests from [`SessionHandle`]s.
enum Command {
    Attach { reply: Reply<LifecycleState> },
    CheckLogin { reply: Reply<LifecycleState> },
    Login {
        credentials: Credentials,
        reply: Reply<LifecycleState>,
    },
    Logout { reply: Reply<LifecycleState> },
    Snapshot { reply: Reply<ControllerSnapshot> },
    Dispose { reply: Reply<()> },
}

/// Completions from tasks the controller spawned.
#[derive(Debug)]
enum Event {
    TimerFired { generation: u64, dialog: Duration },
    PromptResolved {
        generation: u64,
        result: Result<PromptChoice, PromptError>,
    },
}

/// Which `app_entered_*` notification the presenter received last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Announced {
    LoggedIn,
    LoggedOut,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session controller.
///
/// Cheap to clone. Every clone drives the same controller; the one a
/// "logout" button holds is no different from the one the host holds.
/// When the last handle is dropped the controller winds down on its own.
///
/// Lifecycle methods return the state the controller ended up in. A
/// failed login or renewal is not an `Err`: its errors went to the
/// [`Presenter`], and the returned state reflects the outcome. `Err` is
/// only [`TenureError::ControllerStopped`]; the other variants come from
/// host setup code through `?`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<Command>,
    activity: ActivityMonitor,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, TenureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| TenureError::ControllerStopped)?;
        reply_rx.await.map_err(|_| TenureError::ControllerStopped)
    }

    /// Activates the controller: reads the stored token and, if there is
    /// one, checks it with the backend. Without a token the controller
    /// settles in `LoggedOut`.
    pub async fn attach(&self) -> Result<LifecycleState, TenureError> {
        self.request(|reply| Command::Attach { reply }).await
    }

    /// Renews the stored token. On success the inactivity timer is
    /// re-armed with the renewed lifetime; on failure the token is
    /// discarded. Safe to call repeatedly.
    pub async fn check_login(&self) -> Result<LifecycleState, TenureError> {
        self.request(|reply| Command::CheckLogin { reply }).await
    }

    /// Creates a session from `credentials`. On success the new session id
    /// is stored as the token and checked like any other.
    pub async fn login(
        &self,
        credentials: Credentials,
    ) -> Result<LifecycleState, TenureError> {
        self.request(|reply| Command::Login { credentials, reply })
            .await
    }

    /// Ends the session: cancels the timer or open warning, revokes the
    /// session (best effort), and discards the token.
    pub async fn logout(&self) -> Result<LifecycleState, TenureError> {
        self.request(|reply| Command::Logout { reply }).await
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot, TenureError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Returns the current state.
    pub async fn state(&self) -> Result<LifecycleState, TenureError> {
        Ok(self.snapshot().await?.state)
    }

    /// Stops the controller: cancels any live timer or warning, and
    /// unregisters the activity listener. The session itself is left
    /// alone (the token stays stored). Every handle returns
    /// `ControllerStopped` afterwards.
    pub async fn dispose(&self) -> Result<(), TenureError> {
        self.request(|reply| Command::Dispose { reply }).await
    }

    /// Records a user interaction now. Doesn't go through the controller
    /// task, so it never waits.
    pub fn record_activity(&self, kind: ActivityKind) -> Timestamp {
        self.activity.record(kind)
    }

    /// The activity monitor the controller consults.
    pub fn activity(&self) -> &ActivityMonitor {
        &self.activity
    }

    /// `true` once the controller task has exited.
    pub fn is_stopped(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Controller task
// ---------------------------------------------------------------------------

/// Collaborators and settings the controller is spawned with.
pub(crate) struct Parts<B, S, P, W> {
    pub(crate) config: SessionConfig,
    pub(crate) backend: B,
    pub(crate) store: S,
    pub(crate) presenter: P,
    pub(crate) prompt: W,
    pub(crate) activity: ActivityMonitor,
    pub(crate) listener: Option<ActivityListener>,
    pub(crate) channel_size: usize,
}

/// Spawns the controller task and returns a handle to it.
pub(crate) fn spawn<B, S, P, W>(parts: Parts<B, S, P, W>) -> SessionHandle
where
    B: SessionBackend,
    S: TokenStore,
    P: Presenter,
    W: WarningPrompt,
{
    let (sender, commands) = mpsc::channel(parts.channel_size.max(1));
    let (events_tx, events) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        sender,
        activity: parts.activity.clone(),
    };

    let controller = SessionController {
        clock: parts.activity.clock(),
        config: parts.config,
        backend: parts.backend,
        store: parts.store,
        presenter: parts.presenter,
        prompt: Arc::new(parts.prompt),
        activity: parts.activity,
        listener: parts.listener,
        state: LifecycleState::LoggedOut,
        session_info: None,
        last_check_time: None,
        announced: None,
        timer: TimerSlot::new(),
        commands,
        events_tx,
        events,
    };
    tokio::spawn(controller.run());
    handle
}

struct SessionController<B, S, P, W> {
    config: SessionConfig,
    backend: B,
    store: S,
    presenter: P,
    prompt: Arc<W>,
    activity: ActivityMonitor,
    listener: Option<ActivityListener>,
    clock: Clock,

    state: LifecycleState,
    session_info: Option<SessionInfo>,
    last_check_time: Option<Timestamp>,
    announced: Option<Announced>,
    /// The one inactivity timer or warning prompt that may be live.
    timer: TimerSlot,

    commands: mpsc::Receiver<Command>,
    /// Cloned into timer and prompt tasks. Held here too, so `events`
    /// never closes while the controller runs.
    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl<B, S, P, W> SessionController<B, S, P, W>
where
    B: SessionBackend,
    S: TokenStore,
    P: Presenter,
    W: WarningPrompt,
{
    /// Runs until disposed or until every handle is dropped.
    async fn run(mut self) {
        info!(key = %self.config.session_id_key, "session controller started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Dispose { reply }) => {
                        self.dispose();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },

                Some(event) = self.events.recv() => {
                    self.handle_event(event).await;
                }
            }
        }

        self.dispose();
        info!("session controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Attach { reply } => {
                self.attach().await;
                let _ = reply.send(self.state);
            }
            Command::CheckLogin { reply } => {
                self.check_login().await;
                let _ = reply.send(self.state);
            }
            Command::Login { credentials, reply } => {
                self.login(credentials).await;
                let _ = reply.send(self.state);
            }
            Command::Logout { reply } => {
                self.logout().await;
                let _ = reply.send(self.state);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled in `run`, which has to break out of the loop.
            Command::Dispose { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::TimerFired { generation, dialog } => {
                self.on_timer_fired(generation, dialog).await;
            }
            Event::PromptResolved { generation, result } => {
                self.on_prompt_resolved(generation, result).await;
            }
        }
    }

    // --- Operations ---

    async fn attach(&mut self) {
        if self.token().is_some() {
            self.check_login().await;
        } else {
            debug!("no stored session token");
            self.enter_logged_out();
        }
    }

    async fn check_login(&mut self) {
        let Some(token) = self.token() else {
            self.clear_session();
            self.enter_logged_out();
            return;
        };

        match self.backend.renew(&token).await {
            Ok(info) => {
                self.last_check_time = Some(self.clock.now());
                debug!(
                    session_id = %info.session_id,
                    max_age_seconds = info.max_age_seconds,
                    "session renewed"
                );
                self.session_info = Some(info);
                self.state = LifecycleState::LoggedIn;
                self.arm_inactivity_timer();
                self.announce_logged_in();
            }
            Err(errors) => {
                warn!(%errors, "session renewal failed, discarding token");
                self.clear_session();
                self.enter_logged_out();
            }
        }
    }

    async fn login(&mut self, credentials: Credentials) {
        match self.backend.create(&credentials).await {
            Ok(info) => {
                self.store.set(&self.config.session_id_key, &info.session_id);
                info!(session_id = %info.session_id, "session created");
                self.session_info = Some(info);
                self.check_login().await;
            }
            Err(errors) => {
                debug!(count = errors.len(), "login rejected");
                self.presenter.errors_occurred(&errors);
            }
        }
    }

    async fn logout(&mut self) {
        self.timer.cancel();

        let session_id = self
            .session_info
            .as_ref()
            .map(|info| info.session_id.clone())
            .or_else(|| self.token());
        if let Some(session_id) = session_id {
            if let Err(errors) = self.backend.revoke(&session_id).await {
                warn!(%errors, %session_id, "session revoke failed");
            }
        }

        self.clear_session();
        self.enter_logged_out();
    }

    /// Arms the timer from the current session's lifetime. Only while
    /// `LoggedIn`; re-arming replaces any live timer or prompt.
    fn arm_inactivity_timer(&mut self) {
        if self.state != LifecycleState::LoggedIn {
            return;
        }
        let Some(info) = &self.session_info else {
            return;
        };

        let schedule = InactivitySchedule::compute(
            info.max_age_seconds,
            self.config.auto_logout_seconds,
        );
        let dialog = schedule.dialog;
        let events = self.events_tx.clone();
        let generation =
            self.timer.arm(schedule.timeout, move |generation| async move {
                let _ = events.send(Event::TimerFired { generation, dialog });
            });
        debug!(
            generation,
            timeout_ms = schedule.timeout.as_millis() as u64,
            dialog_ms = dialog.as_millis() as u64,
            "inactivity timer armed"
        );
    }

    async fn on_timer_fired(&mut self, generation: u64, dialog: Duration) {
        if !self.timer.settle(generation) {
            return;
        }
        if self.state != LifecycleState::LoggedIn {
            return;
        }

        let active = self
            .last_check_time
            .is_some_and(|mark| self.activity.active_since(mark));
        if active {
            debug!("activity since last renewal, renewing silently");
            self.check_login().await;
            return;
        }
        if dialog.is_zero() {
            debug!("no time left for a warning, logging out");
            self.logout().await;
            return;
        }

        self.state = LifecycleState::WarningPending;
        let prompt = Arc::clone(&self.prompt);
        let events = self.events_tx.clone();
        let generation = self.timer.spawn(move |generation| async move {
            let result = prompt.present(dialog).await;
            let _ = events.send(Event::PromptResolved { generation, result });
        });
        debug!(
            generation,
            dialog_ms = dialog.as_millis() as u64,
            "inactivity warning opened"
        );
    }

    async fn on_prompt_resolved(
        &mut self,
        generation: u64,
        result: Result<PromptChoice, PromptError>,
    ) {
        if !self.timer.settle(generation) {
            return;
        }
        if self.state != LifecycleState::WarningPending {
            return;
        }

        match result {
            Ok(PromptChoice::Logout) => {
                info!("logging out after inactivity warning");
                self.logout().await;
            }
            Ok(PromptChoice::Continue) => {
                debug!("user continued after inactivity warning");
                self.check_login().await;
            }
            Err(e) => {
                // No timer is re-armed: the session lapses server-side
                // and the next check_login finds it gone.
                warn!(error = %e, "inactivity warning unavailable");
                self.state = LifecycleState::LoggedIn;
                self.presenter
                    .errors_occurred(&ErrorList::capability(e.to_string()));
            }
        }
    }

    fn dispose(&mut self) {
        self.timer.cancel();
        if let Some(listener) = self.listener.take() {
            listener.stop();
        }
    }

    // --- State helpers ---

    fn token(&self) -> Option<String> {
        self.store.get(&self.config.session_id_key)
    }

    /// Forgets the session everywhere: token, info, and any live timer.
    fn clear_session(&mut self) {
        self.timer.cancel();
        self.store.remove(&self.config.session_id_key);
        self.session_info = None;
    }

    fn enter_logged_out(&mut self) {
        self.state = LifecycleState::LoggedOut;
        if self.announced != Some(Announced::LoggedOut) {
            self.announced = Some(Announced::LoggedOut);
            info!("logged out");
            self.presenter.app_entered_logged_out();
        }
    }

    fn announce_logged_in(&mut self) {
        if self.announced == Some(Announced::LoggedIn) {
            return;
        }
        if let Some(info) = &self.session_info {
            self.announced = Some(Announced::LoggedIn);
            info!(session_id = %info.session_id, "logged in");
            self.presenter.app_entered_logged_in(info);
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state,
            session_info: self.session_info.clone(),
            last_check_time: self.last_check_time,
            last_activity: self.activity.last_activity(),
            timer_armed: self.timer.is_armed(),
            timer_stats: self.timer.stats(),
        }
    }
}
