//! Controller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for a session controller.
///
/// Serialized with camelCase keys so a host can ship it as JSON:
///
/// ```json
/// { "baseUrl": "https://example.com/api", "sessionIdKey": "sessionId", "autoLogoutSeconds": 30 }
/// ```
///
/// Missing keys fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Root URL of the session backend. `/sessions` is appended to it.
    pub base_url: String,

    /// Key the session token is stored under. Distinct keys let several
    /// apps on the same origin keep separate sessions.
    ///
    /// Default: `"sessionId"`.
    pub session_id_key: String,

    /// How long before server-side expiry the user should be warned, in
    /// seconds. When a session has less lifetime than this left, the
    /// warning window shrinks to half the remaining lifetime.
    ///
    /// Default: 30 seconds.
    pub auto_logout_seconds: f64,
}

impl SessionConfig {
    pub const DEFAULT_SESSION_ID_KEY: &'static str = "sessionId";
    pub const DEFAULT_AUTO_LOGOUT_SECONDS: f64 = 30.0;

    /// A default config pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called automatically when a controller is built. Rules:
    /// - an empty `session_id_key` reverts to the default key
    /// - a negative or non-finite `auto_logout_seconds` reverts to the
    ///   default lead time
    pub fn validated(mut self) -> Self {
        if self.session_id_key.is_empty() {
            warn!(
                default = Self::DEFAULT_SESSION_ID_KEY,
                "empty session id key, using default"
            );
            self.session_id_key = Self::DEFAULT_SESSION_ID_KEY.to_string();
        }
        if !self.auto_logout_seconds.is_finite()
            || self.auto_logout_seconds < 0.0
        {
            warn!(
                value = self.auto_logout_seconds,
                default = Self::DEFAULT_AUTO_LOGOUT_SECONDS,
                "invalid autoLogoutSeconds, using default"
            );
            self.auto_logout_seconds = Self::DEFAULT_AUTO_LOGOUT_SECONDS;
        }
        self
    }

    /// The logout lead time as a `Duration`.
    pub fn auto_logout(&self) -> Duration {
        Duration::try_from_secs_f64(self.auto_logout_seconds)
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            session_id_key: Self::DEFAULT_SESSION_ID_KEY.to_string(),
            auto_logout_seconds: Self::DEFAULT_AUTO_LOGOUT_SECONDS,
        }
    }
}
