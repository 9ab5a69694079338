//! # Tenure
//!
//! Client-side session lifecycle management.
//!
//! Tenure decides at every moment whether the user is logged in, keeps the
//! server-side session alive while they're active, and warns them before
//! an inactivity logout. It doesn't authenticate anyone: a
//! [`SessionBackend`] does that, and Tenure manages the lifetime of what
//! the backend hands out.
//!
//! The pieces, leaves first:
//!
//! - [`SessionBackend`]: create, renew, revoke
//! - [`TokenStore`]: where the session id survives reloads
//! - [`ActivityMonitor`]: when the user last did anything
//! - [`WarningPrompt`]: the "logging out in N seconds" countdown
//! - [`Presenter`]: what the host shows
//! - the controller, reached through a [`SessionHandle`], which ties the
//!   rest together
//!
//! ## Timing
//!
//! After every successful renewal the controller arms one timer:
//!
//! ```text
//! timeout = max_age < auto_logout ? max_age / 2 : max_age - auto_logout
//! ```
//!
//! When it fires, activity since the renewal means a silent renewal.
//! Otherwise the warning opens for the rest of the session's lifetime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tenure::prelude::*;
//!
//! # async fn run() -> Result<(), TenureError> {
//! let config = SessionConfig::with_base_url("http://localhost:2345/api");
//! let backend = HttpSessionBackend::new(&config.base_url)?;
//! let (prompt, _warnings) = ChannelWarningPrompt::new(1);
//!
//! let handle = SessionControllerBuilder::new(config).spawn(
//!     backend,
//!     MemoryTokenStore::new(),
//!     TracingPresenter,
//!     prompt,
//! );
//! handle.attach().await?;
//! handle.login(Credentials::new("alice", "secret")).await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod controller;
mod error;
mod presenter;

pub use builder::{DEFAULT_CHANNEL_SIZE, SessionControllerBuilder};
pub use controller::{ControllerSnapshot, LifecycleState, SessionHandle};
pub use error::TenureError;
pub use presenter::{
    ChannelPresenter, Presenter, PresenterEvent, TracingPresenter,
};

pub use tenure_backend::{BackendError, SessionBackend};
#[cfg(feature = "http")]
pub use tenure_backend::HttpSessionBackend;
pub use tenure_prompt::{
    ChannelWarningPrompt, DEFAULT_WARNING_TEMPLATE, PromptChoice,
    PromptError, PromptResponder, UnavailablePrompt, WarningPrompt,
    WarningRequest, render_warning_message,
};
pub use tenure_protocol::{
    AppError, Credentials, ErrorCategory, ErrorList, ProtocolError,
    SessionInfo,
};
pub use tenure_session::{
    ActivityEmitter, ActivityKind, ActivityListener, ActivityMonitor,
    ActivitySource, ChannelActivitySource, Clock, FileTokenStore,
    MemoryTokenStore, SessionConfig, StoreError, Timestamp, TokenStore,
};
pub use tenure_timer::{InactivitySchedule, TimerStats};

/// Everything a host needs to wire up a controller.
pub mod prelude {
    #[cfg(feature = "http")]
    pub use crate::HttpSessionBackend;
    pub use crate::{
        ActivityKind, ActivityMonitor, ActivitySource, AppError,
        ChannelActivitySource, ChannelPresenter, ChannelWarningPrompt,
        ControllerSnapshot, Credentials, ErrorList, FileTokenStore,
        LifecycleState, MemoryTokenStore, Presenter, PresenterEvent,
        PromptChoice, PromptError, SessionBackend, SessionConfig,
        SessionControllerBuilder, SessionHandle, SessionInfo, TenureError,
        TokenStore, TracingPresenter, UnavailablePrompt, WarningPrompt,
        WarningRequest,
    };
}
