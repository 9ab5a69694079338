//! Session backend abstraction for Tenure.
//!
//! Provides the [`SessionBackend`] trait the session controller talks to
//! when it needs to create, renew, or revoke a session, and an HTTP
//! implementation of it.
//!
//! Every operation returns `Result<_, ErrorList>`. Transport failures and
//! structured rejections are both normalized into an
//! [`ErrorList`](tenure_protocol::ErrorList) here, so the controller
//! handles them identically.
//!
//! # Feature Flags
//!
//! - `http` (default): [`HttpSessionBackend`] via `reqwest`

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::BackendError;
#[cfg(feature = "http")]
pub use http::HttpSessionBackend;

use std::future::Future;
use std::sync::Arc;

use tenure_protocol::{Credentials, ErrorList, SessionInfo};

/// Creates, renews, and revokes server-side sessions.
///
/// Tenure doesn't authenticate anyone itself. It hands credentials or a
/// session id to a backend and manages whatever lifetime comes back.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → the backend is owned by the controller's
///   actor task for as long as the controller runs.
/// - Returned futures are `Send` so that task can live on any runtime
///   worker.
///
/// # Example
///
/// ```rust
/// use tenure_backend::SessionBackend;
/// use tenure_protocol::{AppError, Credentials, ErrorList, SessionInfo};
///
/// /// Accepts one hard-coded user. Sessions last a minute.
/// struct FixedBackend;
///
/// impl SessionBackend for FixedBackend {
///     async fn create(
///         &self,
///         credentials: &Credentials,
///     ) -> Result<SessionInfo, ErrorList> {
///         match credentials.get(Credentials::PASSWORD) {
///             Some("letmein") => Ok(SessionInfo::new("s-1", 60.0)),
///             _ => Err(AppError::for_widget("wrong password", "pw").into()),
///         }
///     }
///
///     async fn renew(&self, session_id: &str) -> Result<SessionInfo, ErrorList> {
///         Ok(SessionInfo::new(session_id, 60.0))
///     }
///
///     async fn revoke(&self, _session_id: &str) -> Result<(), ErrorList> {
///         Ok(())
///     }
/// }
/// ```
pub trait SessionBackend: Send + Sync + 'static {
    /// Establishes a new session from login credentials.
    ///
    /// # Returns
    /// - `Ok(SessionInfo)`: the new session; its `session_id` becomes
    ///   the persisted token
    /// - `Err(ErrorList)`: rejected credentials (usually widget-scoped)
    ///   or a transport failure
    fn create(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<SessionInfo, ErrorList>> + Send;

    /// Extends an existing session.
    ///
    /// An `Err` means the token should be considered dead, whatever the
    /// reason.
    fn renew(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<SessionInfo, ErrorList>> + Send;

    /// Ends a session. Callers treat this as best-effort.
    fn revoke(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), ErrorList>> + Send;
}

/// Lets a backend be shared between the controller and whoever else needs
/// it (tests inspecting call counts, a second controller after reload).
impl<B: SessionBackend> SessionBackend for Arc<B> {
    fn create(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<SessionInfo, ErrorList>> + Send {
        (**self).create(credentials)
    }

    fn renew(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<SessionInfo, ErrorList>> + Send {
        (**self).renew(session_id)
    }

    fn revoke(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), ErrorList>> + Send {
        (**self).revoke(session_id)
    }
}
