/// Errors raised while setting up a session backend.
///
/// Failures of individual calls are not `BackendError`s; they come back
/// as an `ErrorList` so they can be shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The configured base URL can't be parsed or can't carry a path.
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[cfg(feature = "http")]
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}
