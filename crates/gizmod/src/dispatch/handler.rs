//! Transport adapter running a session per accepted connection.

use crate::transport::{ConnectionHandler, ConnectionStream};

use super::dispatcher::Dispatcher;
use super::session::run_session;

/// Connection handler that serves each stream as a session.
#[derive(Debug, Clone)]
pub(crate) struct SessionConnectionHandler {
    dispatcher: Dispatcher,
}

impl SessionConnectionHandler {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl ConnectionHandler for SessionConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        run_session(&self.dispatcher, stream);
    }
}
