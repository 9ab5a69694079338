//! Error types for the protocol layer.
//!
//! Each crate in Tenure defines its own error enum. A `ProtocolError`
//! always means the problem is in serialization/deserialization, not in
//! the network or the session lifecycle.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: an HTML error page where JSON was expected, a
    /// missing `sessionId`, or a truncated body.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The value decoded but violates a protocol rule, e.g. a session
    /// with an empty id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
