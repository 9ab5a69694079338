//! Session state that lives outside the controller's state machine.
//!
//! This crate holds the pieces the controller reads and writes but does
//! not own exclusively:
//!
//! 1. **Configuration**: base URL, token key, logout lead time
//!    ([`SessionConfig`])
//! 2. **Token storage**: where the session id survives reloads
//!    ([`TokenStore`] trait, [`MemoryTokenStore`], [`FileTokenStore`])
//! 3. **Activity tracking**: when the user last touched anything
//!    ([`ActivityMonitor`], fed by an [`ActivitySource`])
//! 4. **Time**: a shared [`Clock`] so activity and renewal marks are
//!    comparable
//!
//! # How it fits in the stack
//!
//! ```text
//! Controller (above)  ← compares activity marks, persists tokens
//!     ↕
//! Session Layer (this crate)  ← config, stores, activity, clock
//!     ↕
//! Protocol Layer (below)  ← SessionInfo, ErrorList, JsonCodec
//! ```

mod activity;
mod clock;
mod config;
mod error;
mod store;

pub use activity::{
    ActivityEmitter, ActivityKind, ActivityListener, ActivityMonitor,
    ActivitySource, ChannelActivitySource,
};
pub use clock::{Clock, Timestamp};
pub use config::SessionConfig;
pub use error::StoreError;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
