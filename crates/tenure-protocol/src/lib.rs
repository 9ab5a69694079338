//! Data model for Tenure.
//!
//! This crate defines the values that cross the boundary between the
//! session controller and its collaborators:
//!
//! - **Types** ([`SessionInfo`], [`ErrorList`], [`AppError`],
//!   [`Credentials`]): what the session backend returns and what the
//!   presentation layer displays.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about timers, tokens, or HTTP. It only
//! describes the shape of the data.
//!
//! ```text
//! Backend (bytes) → Protocol (SessionInfo | ErrorList) → Controller
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AppError, Credentials, ErrorCategory, ErrorList, ErrorOptions,
    SessionInfo,
};
