//! `SessionControllerBuilder`: configuration and startup.

use tenure_backend::SessionBackend;
use tenure_prompt::WarningPrompt;
use tenure_session::{
    ActivityListener, ActivityMonitor, ActivitySource, Clock, SessionConfig,
    TokenStore,
};

use crate::Presenter;
use crate::controller::{self, Parts, SessionHandle};

/// Default capacity of the controller's command channel.
pub const DEFAULT_CHANNEL_SIZE: usize = 32;

type StartListener = Box<dyn FnOnce(&ActivityMonitor) -> ActivityListener + Send>;

/// Builder for configuring and starting a session controller.
///
/// # Example
///
/// ```rust,ignore
/// use tenure::prelude::*;
///
/// let handle = SessionControllerBuilder::new(config)
///     .activity_source(source)
///     .spawn(backend, MemoryTokenStore::new(), presenter, prompt);
/// handle.attach().await?;
/// ```
pub struct SessionControllerBuilder {
    config: SessionConfig,
    channel_size: usize,
    activity: Option<ActivityMonitor>,
    start_listener: Option<StartListener>,
}

impl SessionControllerBuilder {
    /// Creates a builder. `config` is validated when the controller is
    /// spawned.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            channel_size: DEFAULT_CHANNEL_SIZE,
            activity: None,
            start_listener: None,
        }
    }

    /// Sets how many commands may queue while the controller is busy
    /// (for example, waiting on the backend).
    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size;
        self
    }

    /// Uses an existing activity monitor instead of creating one. The
    /// monitor's clock becomes the controller's clock.
    pub fn activity_monitor(mut self, monitor: ActivityMonitor) -> Self {
        self.activity = Some(monitor);
        self
    }

    /// Feeds user activity from `source` for as long as the controller
    /// runs. Without a source, activity can still be recorded through
    /// [`SessionHandle::record_activity`].
    pub fn activity_source<A: ActivitySource>(mut self, source: A) -> Self {
        self.start_listener =
            Some(Box::new(move |monitor: &ActivityMonitor| monitor.listen(source)));
        self
    }

    /// Spawns the controller task and returns its handle.
    ///
    /// The controller starts in `LoggedOut` and does nothing until
    /// [`SessionHandle::attach`] is called. Must be called from inside a
    /// Tokio runtime.
    pub fn spawn<B, S, P, W>(
        self,
        backend: B,
        store: S,
        presenter: P,
        prompt: W,
    ) -> SessionHandle
    where
        B: SessionBackend,
        S: TokenStore,
        P: Presenter,
        W: WarningPrompt,
    {
        let activity = self
            .activity
            .unwrap_or_else(|| ActivityMonitor::new(Clock::new()));
        let listener = self.start_listener.map(|start| start(&activity));

        controller::spawn(Parts {
            config: self.config.validated(),
            backend,
            store,
            presenter,
            prompt,
            activity,
            listener,
            channel_size: self.channel_size,
        })
    }
}
