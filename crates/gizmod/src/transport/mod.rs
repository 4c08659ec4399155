//! Controller socket listener.
//!
//! The listener binds the configured endpoint and serves every accepted stream
//! through a [`ConnectionHandler`] on its own thread. It keeps those threads
//! so that stopping the listener also closes every open connection.

mod connections;
mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;
#[cfg(test)]
mod test_utils;

pub(crate) use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::SocketListener;
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
