//! The presentation layer's side of the controller.
//!
//! The controller never draws anything. It tells a [`Presenter`] which
//! screen the host should be on and which errors to show, and the host
//! does the rest.

use std::sync::Arc;

use tenure_protocol::{ErrorList, SessionInfo};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receives lifecycle notifications from the controller.
///
/// Calls are made from the controller task, one at a time, and must not
/// block for long.
///
/// The controller deduplicates the two `app_entered_*` notifications: each
/// is delivered once per actual transition, never twice in a row.
pub trait Presenter: Send + Sync + 'static {
    /// The user is now logged in. Show the application.
    fn app_entered_logged_in(&self, session: &SessionInfo);

    /// The user is now logged out. Show the login form.
    fn app_entered_logged_out(&self);

    /// Something went wrong that the user should see. Widget-scoped
    /// errors belong next to their input; the rest go in a page-level
    /// list (see `ErrorList::for_widget` and `ErrorList::generic`).
    fn errors_occurred(&self, errors: &ErrorList);
}

impl<P: Presenter> Presenter for Arc<P> {
    fn app_entered_logged_in(&self, session: &SessionInfo) {
        (**self).app_entered_logged_in(session);
    }

    fn app_entered_logged_out(&self) {
        (**self).app_entered_logged_out();
    }

    fn errors_occurred(&self, errors: &ErrorList) {
        (**self).errors_occurred(errors);
    }
}

// ---------------------------------------------------------------------------
// ChannelPresenter
// ---------------------------------------------------------------------------

/// A notification, as delivered by [`ChannelPresenter`].
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    LoggedIn(SessionInfo),
    LoggedOut,
    Errors(ErrorList),
}

/// A [`Presenter`] that forwards every notification over a channel.
///
/// Useful when the host's UI runs in its own task, and in tests.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    sender: mpsc::UnboundedSender<PresenterEvent>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PresenterEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: PresenterEvent) {
        if self.sender.send(event).is_err() {
            warn!("presenter receiver dropped, notification lost");
        }
    }
}

impl Presenter for ChannelPresenter {
    fn app_entered_logged_in(&self, session: &SessionInfo) {
        self.send(PresenterEvent::LoggedIn(session.clone()));
    }

    fn app_entered_logged_out(&self) {
        self.send(PresenterEvent::LoggedOut);
    }

    fn errors_occurred(&self, errors: &ErrorList) {
        self.send(PresenterEvent::Errors(errors.clone()));
    }
}

// ---------------------------------------------------------------------------
// TracingPresenter
// ---------------------------------------------------------------------------

/// A [`Presenter`] that only logs. For headless hosts.
#[derive(Debug, Clone, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn app_entered_logged_in(&self, session: &SessionInfo) {
        info!(
            session_id = %session.session_id,
            max_age_seconds = session.max_age_seconds,
            "app entered logged-in state"
        );
    }

    fn app_entered_logged_out(&self) {
        info!("app entered logged-out state");
    }

    fn errors_occurred(&self, errors: &ErrorList) {
        for error in errors {
            warn!(widget = error.widget(), message = %error.message, "session error");
        }
    }
}
