//! Failures binding or serving the controller socket.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding the controller socket or running its
/// accept loop.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Host name resolution failed.
    #[error("cannot resolve controller endpoint {endpoint}: {source}")]
    Resolve {
        /// Configured endpoint.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no address.
    #[error("controller endpoint {endpoint} resolved to no address")]
    NoAddress {
        /// Configured endpoint.
        endpoint: String,
    },
    /// Binding the socket failed.
    #[error("cannot bind controller endpoint {endpoint}: {source}")]
    Bind {
        /// Configured endpoint.
        endpoint: String,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Another process accepts connections on the Unix socket.
    #[error("another host is already listening on {path}")]
    SocketInUse {
        /// Socket path.
        path: String,
    },
    /// The Unix socket path is occupied by something that is not a socket.
    #[error("{path} exists and is not a socket")]
    NotASocket {
        /// Occupied path.
        path: String,
    },
    /// A leftover Unix socket could not be inspected or removed.
    #[error("cannot reclaim leftover socket {path}: {source}")]
    StaleSocket {
        /// Socket path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Non-blocking accepts could not be enabled.
    #[error("cannot enable non-blocking accepts: {source}")]
    Configure {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be started.
    #[error("cannot start accept thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked; open connections may not have been closed.
    #[error("accept thread panicked")]
    AcceptLoopPanicked,
    /// Unix endpoints were requested on a platform without them.
    #[cfg(not(unix))]
    #[error("unix endpoint {endpoint} is unsupported on this platform")]
    UnixUnsupported {
        /// Configured endpoint.
        endpoint: String,
    },
}
