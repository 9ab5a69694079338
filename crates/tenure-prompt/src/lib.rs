//! The inactivity warning: "you will be logged out in N seconds".
//!
//! When the inactivity timer fires and the user hasn't done anything since
//! the last renewal, the controller asks a [`WarningPrompt`] to show a
//! countdown with two options. The prompt resolves to exactly one
//! [`PromptChoice`]:
//!
//! | what happened                     | result                   |
//! |-----------------------------------|--------------------------|
//! | user picked "continue" / dismissed | `Ok(Continue)`          |
//! | user picked "logout"               | `Ok(Logout)`            |
//! | countdown reached zero             | `Ok(Logout)`            |
//! | host can't show the warning        | `Err(CapabilityUnavailable)` |
//!
//! Two implementations ship here:
//! - [`ChannelWarningPrompt`] hands each warning to a host renderer over a
//!   channel and runs the countdown itself.
//! - [`UnavailablePrompt`] always reports `CapabilityUnavailable`, for
//!   hosts with nowhere to show a dialog.

mod channel;
mod error;

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use channel::{ChannelWarningPrompt, PromptResponder, WarningRequest};
pub use error::PromptError;

/// Message shown by default. `${seconds}` is replaced with the remaining
/// countdown.
pub const DEFAULT_WARNING_TEMPLATE: &str =
    "You will be logged out due to inactivity in ${seconds} seconds";

const SECONDS_PLACEHOLDER: &str = "${seconds}";

/// Substitutes `seconds` into every `${seconds}` in `template`.
///
/// ```rust
/// use tenure_prompt::{render_warning_message, DEFAULT_WARNING_TEMPLATE};
///
/// assert_eq!(
///     render_warning_message(DEFAULT_WARNING_TEMPLATE, 12),
///     "You will be logged out due to inactivity in 12 seconds"
/// );
/// ```
pub fn render_warning_message(template: &str, seconds: u64) -> String {
    template.replace(SECONDS_PLACEHOLDER, &seconds.to_string())
}

// ---------------------------------------------------------------------------
// PromptChoice
// ---------------------------------------------------------------------------

/// How a warning was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptChoice {
    /// Keep the session: renew it and re-arm the timer.
    Continue,
    /// End the session now.
    Logout,
}

impl PromptChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for PromptChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptChoice {
    type Err = PromptError;

    /// Accepts the names a dialog form submits: `logout`, and either
    /// `continue` or `logoutCancel` for the keep-going button.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "continue" | "logoutCancel" => Ok(Self::Continue),
            "logout" => Ok(Self::Logout),
            other => Err(PromptError::UnknownChoice(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// WarningPrompt
// ---------------------------------------------------------------------------

/// Presents the inactivity warning and waits for it to resolve.
///
/// Implementations own the countdown: if nothing is chosen within
/// `dialog`, `present` resolves to [`PromptChoice::Logout`]. A resolution
/// happens at most once; whatever arrives after it is ignored.
///
/// The controller runs `present` in its own task and aborts it when the
/// session ends some other way (explicit logout, dispose), so
/// implementations must tolerate being dropped mid-await.
pub trait WarningPrompt: Send + Sync + 'static {
    fn present(
        &self,
        dialog: Duration,
    ) -> impl Future<Output = Result<PromptChoice, PromptError>> + Send;
}

impl<P: WarningPrompt> WarningPrompt for Arc<P> {
    fn present(
        &self,
        dialog: Duration,
    ) -> impl Future<Output = Result<PromptChoice, PromptError>> + Send {
        (**self).present(dialog)
    }
}

/// A prompt for hosts that can't show one.
#[derive(Debug, Clone, Default)]
pub struct UnavailablePrompt;

impl WarningPrompt for UnavailablePrompt {
    async fn present(
        &self,
        _dialog: Duration,
    ) -> Result<PromptChoice, PromptError> {
        tracing::warn!("warning prompt requested but none is available");
        Err(PromptError::CapabilityUnavailable(
            "The warning dialog is not supported by this host".into(),
        ))
    }
}

/// Whole seconds in `dialog`, rounded up.
pub(crate) fn ceil_seconds(dialog: Duration) -> u64 {
    let secs = dialog.as_secs();
    if dialog.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
