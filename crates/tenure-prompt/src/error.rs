//! Error types for the warning prompt.

/// Errors from presenting a warning or parsing a choice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    /// The host can't show a blocking warning right now (no renderer
    /// attached, renderer busy, or no dialog support at all).
    ///
    /// The session isn't logged out when this happens; it lapses on the
    /// server side instead.
    #[error("{0}")]
    CapabilityUnavailable(String),

    /// A renderer answered with a name that isn't a known choice.
    #[error("unknown warning choice: {0:?}")]
    UnknownChoice(String),
}
