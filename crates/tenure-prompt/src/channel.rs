//! A warning prompt rendered by the host over a channel.
//!
//! [`ChannelWarningPrompt`] owns the countdown; the host only draws. For
//! each warning the host receives a [`WarningRequest`] carrying:
//!
//! - a live view of the remaining seconds, ticking once per second, and
//! - a [`PromptResponder`] to answer with.
//!
//! ```text
//! controller ── present(dialog) ──▶ ChannelWarningPrompt
//!                                     │  WarningRequest (mpsc)
//!                                     ▼
//!                                   host renderer
//!                                     │  responder.respond(choice)
//!                                     ▼
//!            ◀── Ok(choice) ──────── select! { answer, deadline, tick }
//! ```
//!
//! Whichever comes first, an answer or the deadline, wins. The responder
//! wraps a single `oneshot::Sender` taken under a lock, so a second answer
//! (or an answer after the deadline) is refused.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, interval_at};
use tracing::{debug, warn};

use crate::{
    DEFAULT_WARNING_TEMPLATE, PromptChoice, PromptError, WarningPrompt,
    ceil_seconds, render_warning_message,
};

const TICK: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// PromptResponder
// ---------------------------------------------------------------------------

type Slot = Arc<Mutex<Option<oneshot::Sender<PromptChoice>>>>;

/// Answers one warning. Clones answer the same warning.
#[derive(Debug, Clone)]
pub struct PromptResponder {
    slot: Slot,
}

impl PromptResponder {
    fn new(sender: oneshot::Sender<PromptChoice>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(sender))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<oneshot::Sender<PromptChoice>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolves the warning with `choice`.
    ///
    /// Returns `true` only if this answer is the one the warning resolves
    /// with. Returns `false` if the warning was already resolved, timed
    /// out, or was withdrawn by the controller.
    pub fn respond(&self, choice: PromptChoice) -> bool {
        match self.lock().take() {
            Some(sender) => sender.send(choice).is_ok(),
            None => false,
        }
    }

    /// Closes the warning without picking a button (Escape). Counts as
    /// [`PromptChoice::Continue`].
    pub fn dismiss(&self) -> bool {
        self.respond(PromptChoice::Continue)
    }

    /// `true` while an answer would still be accepted.
    pub fn is_open(&self) -> bool {
        self.lock().as_ref().is_some_and(|sender| !sender.is_closed())
    }

    fn close(&self) {
        self.lock().take();
    }
}

// ---------------------------------------------------------------------------
// WarningRequest
// ---------------------------------------------------------------------------

/// One warning for the host to draw.
#[derive(Debug)]
pub struct WarningRequest {
    dialog: Duration,
    template: Arc<str>,
    remaining: watch::Receiver<u64>,
    responder: PromptResponder,
}

impl WarningRequest {
    /// The full length of the warning window.
    pub fn dialog(&self) -> Duration {
        self.dialog
    }

    /// Seconds left on the countdown right now.
    pub fn remaining_seconds(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// The warning text for the current countdown value.
    pub fn message(&self) -> String {
        render_warning_message(&self.template, self.remaining_seconds())
    }

    /// Waits for the countdown to move. Returns the new value, or `None`
    /// once the warning is over (answered, timed out, or withdrawn) and
    /// the host should take it down.
    pub async fn next_tick(&mut self) -> Option<u64> {
        self.remaining.changed().await.ok()?;
        Some(*self.remaining.borrow_and_update())
    }

    pub fn responder(&self) -> &PromptResponder {
        &self.responder
    }

    /// Answers the warning. Shorthand for `responder().respond(choice)`.
    pub fn respond(&self, choice: PromptChoice) -> bool {
        self.responder.respond(choice)
    }
}

// ---------------------------------------------------------------------------
// ChannelWarningPrompt
// ---------------------------------------------------------------------------

/// A [`WarningPrompt`] that forwards each warning to a host renderer.
#[derive(Debug, Clone)]
pub struct ChannelWarningPrompt {
    requests: mpsc::Sender<WarningRequest>,
    template: Arc<str>,
}

impl ChannelWarningPrompt {
    /// Creates a prompt and the receiver the host renderer reads from.
    ///
    /// `buffer` bounds how many warnings may wait unread. A warning that
    /// doesn't fit is reported as `CapabilityUnavailable`.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<WarningRequest>) {
        let (requests, receiver) = mpsc::channel(buffer.max(1));
        let prompt = Self {
            requests,
            template: Arc::from(DEFAULT_WARNING_TEMPLATE),
        };
        (prompt, receiver)
    }

    /// Replaces the message template. See [`render_warning_message`].
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Arc::from(template.into());
        self
    }
}

impl WarningPrompt for ChannelWarningPrompt {
    async fn present(
        &self,
        dialog: Duration,
    ) -> Result<PromptChoice, PromptError> {
        if dialog.is_zero() {
            return Ok(PromptChoice::Logout);
        }

        let start = Instant::now();
        let (remaining_tx, remaining) = watch::channel(ceil_seconds(dialog));
        let (answer_tx, mut answer) = oneshot::channel();
        let responder = PromptResponder::new(answer_tx);

        let request = WarningRequest {
            dialog,
            template: Arc::clone(&self.template),
            remaining,
            responder: responder.clone(),
        };
        self.requests.try_send(request).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "warning renderer is busy",
                TrySendError::Closed(_) => "no warning renderer is attached",
            };
            warn!(reason, "cannot present inactivity warning");
            PromptError::CapabilityUnavailable(reason.into())
        })?;
        debug!(seconds = ceil_seconds(dialog), "inactivity warning presented");

        let deadline = tokio::time::sleep_until(start + dialog);
        tokio::pin!(deadline);
        let mut ticks = interval_at(start + TICK, TICK);

        loop {
            tokio::select! {
                biased;

                answer = &mut answer => {
                    // `responder` keeps the sender alive until `close`.
                    let choice = answer.unwrap_or(PromptChoice::Logout);
                    debug!(%choice, "inactivity warning answered");
                    return Ok(choice);
                }

                () = &mut deadline => {
                    responder.close();
                    // An answer accepted before the close still counts.
                    if let Ok(choice) = answer.try_recv() {
                        debug!(%choice, "inactivity warning answered at the deadline");
                        return Ok(choice);
                    }
                    remaining_tx.send_replace(0);
                    debug!("inactivity warning timed out");
                    return Ok(PromptChoice::Logout);
                }

                _ = ticks.tick() => {
                    remaining_tx.send_modify(|left| *left = left.saturating_sub(1));
                }
            }
        }
    }
}
