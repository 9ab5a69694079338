//! Core data types exchanged with the session backend and the
//! presentation layer.
//!
//! Field names on the wire are camelCase (`sessionId`, `maxAgeSeconds`)
//! because that's what session backends send. Anything a backend adds
//! beyond the fields the controller needs is kept verbatim in `extra`
//! maps so it can be handed to the application untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// SessionInfo
// ---------------------------------------------------------------------------

/// A server-issued session, as returned by a successful create or renew.
///
/// The controller only looks at `session_id` and `max_age_seconds`.
/// Every other field the backend sends is flattened into `extra`, so
/// `{"sessionId":"a","maxAgeSeconds":60,"userId":"u1"}` round-trips with
/// `userId` intact.
///
/// A `SessionInfo` is never edited in place: each successful renewal
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Opaque session identifier. Doubles as the persisted token.
    pub session_id: String,

    /// Remaining session lifetime, in seconds, as of the call that
    /// produced this value.
    pub max_age_seconds: f64,

    /// Backend-defined fields the controller doesn't interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionInfo {
    /// Creates a session with no backend-defined fields.
    pub fn new(session_id: impl Into<String>, max_age_seconds: f64) -> Self {
        Self {
            session_id: session_id.into(),
            max_age_seconds,
            extra: Map::new(),
        }
    }

    /// Checks the two fields the controller relies on.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] if the id is empty or the lifetime
    /// is not a finite, non-negative number.
    pub fn validated(self) -> Result<Self, ProtocolError> {
        if self.session_id.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "session id is empty".into(),
            ));
        }
        if !self.max_age_seconds.is_finite() || self.max_age_seconds < 0.0 {
            return Err(ProtocolError::InvalidMessage(format!(
                "invalid maxAgeSeconds {}",
                self.max_age_seconds
            )));
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// AppError / ErrorList
// ---------------------------------------------------------------------------

/// Where an error came from.
///
/// Backend rejections normally arrive without a category; the controller
/// tags the errors it synthesizes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    /// The backend could not be reached or sent something unreadable.
    Transport,
    /// The backend answered with a structured rejection.
    Rejection,
    /// The environment cannot present the logout warning.
    Capability,
}

/// Display hints attached to an [`AppError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorOptions {
    /// Id of the input widget the error concerns (e.g. `"pw"`). Errors
    /// without a widget are shown in the generic error list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,

    /// Backend-defined options the controller doesn't interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single user-displayable error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppError {
    pub message: String,
    #[serde(default)]
    pub options: ErrorOptions,
}

impl AppError {
    /// A generic error, shown in the page-level error list.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            options: ErrorOptions::default(),
        }
    }

    /// An error scoped to a specific input widget.
    pub fn for_widget(
        message: impl Into<String>,
        widget: impl Into<String>,
    ) -> Self {
        let mut err = Self::new(message);
        err.options.widget = Some(widget.into());
        err
    }

    /// Tags the error with a category.
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.options.category = Some(category);
        self
    }

    /// The widget this error is scoped to, if any.
    pub fn widget(&self) -> Option<&str> {
        self.options.widget.as_deref()
    }
}

/// An ordered list of errors, as produced by the backend or synthesized
/// from a transport/capability failure.
///
/// On the wire it is `{"errors": [...]}`. A body without an `errors`
/// field does not decode as an `ErrorList`, which is how the HTTP backend
/// tells a structured rejection from an arbitrary failure page.
///
/// `ErrorList` implements `std::error::Error`, so it is the `Err` side of
/// every session backend call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorList {
    errors: Vec<AppError>,
}

impl ErrorList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error, builder style.
    pub fn add(mut self, error: AppError) -> Self {
        self.errors.push(error);
        self
    }

    /// Appends an error in place.
    pub fn push(&mut self, error: AppError) {
        self.errors.push(error);
    }

    /// One-entry list for a failed or unreadable backend call.
    pub fn transport(cause: impl fmt::Display) -> Self {
        Self::from(
            AppError::new(cause.to_string())
                .with_category(ErrorCategory::Transport),
        )
    }

    /// One-entry list for a warning surface the environment can't show.
    pub fn capability(message: impl Into<String>) -> Self {
        Self::from(
            AppError::new(message).with_category(ErrorCategory::Capability),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AppError> {
        self.errors.iter()
    }

    /// Errors scoped to `widget`, in order.
    pub fn for_widget<'a>(
        &'a self,
        widget: &'a str,
    ) -> impl Iterator<Item = &'a AppError> + 'a {
        self.errors.iter().filter(move |e| e.widget() == Some(widget))
    }

    /// Errors that belong in the page-level list: those with no widget,
    /// plus those whose widget is not one of `known_widgets`.
    pub fn generic<'a>(
        &'a self,
        known_widgets: &'a [&'a str],
    ) -> impl Iterator<Item = &'a AppError> + 'a {
        self.errors.iter().filter(move |e| match e.widget() {
            Some(w) => !known_widgets.contains(&w),
            None => true,
        })
    }
}

impl From<AppError> for ErrorList {
    fn from(error: AppError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl FromIterator<AppError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = AppError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a AppError;
    type IntoIter = std::slice::Iter<'a, AppError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Messages, one per line.
impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&err.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Login form fields, sent as the JSON body of a session create.
///
/// Stored as an ordered map so the body is deterministic. No validation
/// happens here; the backend decides what's acceptable.
///
/// `Debug` prints field names only, so credentials can't leak into logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    /// Field name for the login id.
    pub const LOGIN_ID: &'static str = "loginId";
    /// Field name for the password.
    pub const PASSWORD: &'static str = "pw";

    /// The standard two-field login form.
    pub fn new(login_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self::default()
            .with(Self::LOGIN_ID, login_id)
            .with(Self::PASSWORD, password)
    }

    /// Adds or replaces a field.
    pub fn with(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Field names, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.fields()).finish()
    }
}
