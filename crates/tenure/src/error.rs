//! Unified error type for Tenure.

use tenure_backend::BackendError;
use tenure_prompt::PromptError;
use tenure_protocol::ProtocolError;
use tenure_session::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// None of these describe a lifecycle outcome. A rejected login or a
/// failed renewal is reported to the [`Presenter`](crate::Presenter) as
/// an `ErrorList`, and the call that caused it still returns `Ok`.
///
/// [`SessionHandle`](crate::SessionHandle) methods only ever return
/// [`ControllerStopped`](Self::ControllerStopped). The wrapping variants
/// are for host setup code (building an `HttpSessionBackend`, reading a
/// `FileTokenStore`, checking a `SessionInfo`) so it can use `?` into
/// one error type.
#[derive(Debug, thiserror::Error)]
pub enum TenureError {
    /// Encoding or decoding session data failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session backend could not be constructed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The token store file could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The warning prompt failed outside of a lifecycle transition.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// The controller task has exited (disposed, or every handle dropped
    /// and the task wound down).
    #[error("session controller has stopped")]
    ControllerStopped,
}
