//! Controller socket: binding, the accept loop and connection teardown.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use gizmo_config::SocketEndpoint;

use super::connections::ConnectionSet;
use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

const IDLE_POLL: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

#[derive(Debug)]
enum Acceptor {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Controller socket bound to its endpoint but not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    acceptor: Acceptor,
}

impl SocketListener {
    /// Binds `endpoint`, reclaiming a Unix socket file left by a dead host.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let acceptor = match endpoint {
            SocketEndpoint::Tcp { host, port } => Acceptor::Tcp(bind_tcp(endpoint, host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                Acceptor::Unix(bind_unix(endpoint, path.as_std_path())?)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::UnixUnsupported {
                    endpoint: endpoint.to_string(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            acceptor,
        })
    }

    /// Bound TCP address; resolves the port chosen for `:0` endpoints.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Acceptor::Unix(_) => None,
        }
    }

    pub(crate) fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Starts accepting on a background thread, serving each connection with
    /// `handler`.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.set_nonblocking() {
            self.remove_socket_file();
            return Err(ListenerError::Configure { source });
        }
        let stop = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener: self,
            stop: Arc::clone(&stop),
            handler,
            connections: ConnectionSet::default(),
        };
        let thread = thread::Builder::new()
            .name(String::from("gizmod-accept"))
            .spawn(move || accept_loop.run())
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn set_nonblocking(&self) -> io::Result<()> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Acceptor::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Next pending connection as a blocking stream; `None` when idle.
    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match &self.acceptor {
            Acceptor::Tcp(listener) => listener.accept().and_then(|(stream, peer)| {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                debug!(target: LISTENER_TARGET, peer = %peer, "tcp controller connected");
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Acceptor::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    #[cfg(not(unix))]
    fn remove_socket_file(&self) {}

    #[cfg(unix)]
    fn remove_socket_file(&self) {
        if let SocketEndpoint::Unix { path } = &self.endpoint
            && let Err(error) = fs::remove_file(path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: LISTENER_TARGET,
                path = %path,
                error = %error,
                "failed to remove controller socket"
            );
        }
    }
}

/// Stops the accept loop and waits for it.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<usize>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop after its current iteration.
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop, which closes every open connection and
    /// joins its thread before returning.
    ///
    /// Returns how many connections were still open at shutdown.
    pub(crate) fn join(mut self) -> Result<usize, ListenerError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ListenerError::AcceptLoopPanicked),
            None => Ok(0),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

struct AcceptLoop {
    listener: SocketListener,
    stop: Arc<AtomicBool>,
    handler: Arc<dyn ConnectionHandler>,
    connections: ConnectionSet,
}

impl AcceptLoop {
    fn run(mut self) -> usize {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.listener.endpoint,
            "accepting controller connections"
        );
        let mut repeated = None::<io::ErrorKind>;
        while !self.stop.load(Ordering::SeqCst) {
            self.connections.reap();
            match self.listener.accept() {
                Ok(Some(stream)) => {
                    repeated = None;
                    if let Err(error) = self.connections.serve(stream, &self.handler) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %error,
                            "cannot serve connection; dropping it"
                        );
                    }
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    if repeated != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, error = %error, "accept failed");
                    }
                    repeated = Some(error.kind());
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        self.listener.remove_socket_file();
        let closed = self.connections.close_all();
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.listener.endpoint,
            closed,
            "listener stopped"
        );
        closed
    }
}

fn bind_tcp(endpoint: &SocketEndpoint, host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            endpoint: endpoint.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::NoAddress {
            endpoint: endpoint.to_string(),
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(unix)]
fn bind_unix(endpoint: &SocketEndpoint, path: &Path) -> Result<UnixListener, ListenerError> {
    reclaim_stale_socket(path)?;
    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Removes a socket file nobody accepts on; refuses anything else.
#[cfg(unix)]
fn reclaim_stale_socket(path: &Path) -> Result<(), ListenerError> {
    let stale = |source| ListenerError::StaleSocket {
        path: path.display().to_string(),
        source,
    };
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(stale(error)),
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::NotASocket {
            path: path.display().to_string(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(ListenerError::SocketInUse {
            path: path.display().to_string(),
        }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(
                target: LISTENER_TARGET,
                path = %path.display(),
                "removing leftover controller socket"
            );
            fs::remove_file(path).map_err(stale)
        }
        Err(error) => Err(stale(error)),
    }
}
