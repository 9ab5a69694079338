//! Codec trait and implementations for serializing/deserializing values.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The HTTP backend decodes response bodies through it and the file token
//! store persists its map through it, so neither cares which format is
//! used underneath.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// - `Send + Sync` → the codec is held by collaborators that run inside
///   Tokio tasks.
/// - `'static` → it owns everything it needs.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Session backends speak JSON, so this is the only codec shipped.
///
/// ## Example
///
/// ```rust
/// use tenure_protocol::{Codec, ErrorList, JsonCodec};
///
/// let codec = JsonCodec;
/// let body = br#"{"errors":[{"message":"bad password","options":{"widget":"pw"}}]}"#;
///
/// let errors: ErrorList = codec.decode(body).unwrap();
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors.for_widget("pw").count(), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionInfo;

    #[test]
    fn test_decode_session_body_keeps_backend_fields() {
        let body = br#"{"sessionId":"abc","maxAgeSeconds":90,"userId":"u-7"}"#;

        let info: SessionInfo = JsonCodec.decode(body).expect("valid body");

        assert_eq!(info.session_id, "abc");
        assert_eq!(info.max_age_seconds, 90.0);
        assert_eq!(info.extra["userId"], "u-7");
    }

    #[test]
    fn test_decode_html_body_returns_decode_error() {
        let result: Result<SessionInfo, _> =
            JsonCodec.decode(b"<html>502 Bad Gateway</html>");

        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_session_uses_wire_field_names() {
        let info = SessionInfo::new("s-1", 60.0);

        let bytes = JsonCodec.encode(&info).expect("encodes");
        let json = String::from_utf8(bytes).unwrap();

        assert!(json.contains("\"sessionId\":\"s-1\""));
        assert!(json.contains("\"maxAgeSeconds\":60.0"));
    }
}
