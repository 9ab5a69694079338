//! Error types for token storage.

use std::path::PathBuf;

/// Errors from a [`FileTokenStore`](crate::FileTokenStore).
///
/// The [`TokenStore`](crate::TokenStore) trait itself is infallible; a
/// store that can fail logs the failure and degrades (absent token on
/// read, no-op on write). The `try_*` methods expose the failure for
/// callers that want it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing, or renaming the store file failed.
    #[error("token store io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store file exists but isn't a JSON object of strings.
    #[error("token store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: tenure_protocol::ProtocolError,
    },

    /// The token map could not be serialized.
    #[error("token store encode failed: {0}")]
    Encode(#[source] tenure_protocol::ProtocolError),
}
