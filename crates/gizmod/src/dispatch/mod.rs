//! Session handling, request routing and focus broadcasts.
//!
//! Each accepted connection becomes a session that reads newline-delimited
//! envelopes, routes the decoded request against the shared document store,
//! and writes at most one framed response per request. Sessions also register
//! a writer with the [`SessionRegistry`] so host-originated events such as
//! `focusedAppUpdated` reach every connected controller.

mod dispatcher;
mod errors;
mod handler;
mod registry;
mod router;
mod session;
mod store_manager;

pub use self::dispatcher::{Dispatcher, FocusNotifier, SessionSettings};
pub use self::errors::DispatchError;
pub(crate) use self::handler::SessionConnectionHandler;
pub use self::registry::{BroadcastReport, SessionId, SessionRegistry};
pub use self::session::SessionState;
pub use self::store_manager::StoreManager;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Sent before closing a session whose peer exceeded the frame limit.
pub const FRAME_TOO_LARGE_MESSAGE: &str = "Frame exceeds maximum size";
