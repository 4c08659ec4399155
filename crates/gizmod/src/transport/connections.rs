//! Threads serving accepted connections.

use std::io;
use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET};

#[derive(Debug)]
struct Connection {
    id: u64,
    control: ConnectionStream,
    thread: JoinHandle<()>,
}

impl Connection {
    fn join(self) {
        if self.thread.join().is_err() {
            warn!(
                target: LISTENER_TARGET,
                connection = self.id,
                "connection thread panicked"
            );
        }
    }
}

/// Connections spawned by one accept loop.
///
/// Every entry keeps a second handle on its socket. Shutting that handle down
/// ends the serving thread's blocking read, so [`close_all`] can join every
/// thread without cooperation from the handler.
///
/// [`close_all`]: ConnectionSet::close_all
#[derive(Debug, Default)]
pub(crate) struct ConnectionSet {
    next_id: u64,
    open: Vec<Connection>,
}

impl ConnectionSet {
    /// Serves `stream` on a new thread.
    ///
    /// On error the stream is dropped, which closes the connection.
    pub(crate) fn serve(
        &mut self,
        stream: ConnectionStream,
        handler: &Arc<dyn ConnectionHandler>,
    ) -> io::Result<()> {
        let control = stream.try_clone()?;
        let id = self.next_id;
        self.next_id += 1;
        let handler = Arc::clone(handler);
        let thread = thread::Builder::new()
            .name(format!("gizmod-conn-{id}"))
            .spawn(move || handler.handle(stream))?;
        debug!(target: LISTENER_TARGET, connection = id, "serving connection");
        self.open.push(Connection {
            id,
            control,
            thread,
        });
        Ok(())
    }

    /// Joins the threads of connections that already ended.
    pub(crate) fn reap(&mut self) {
        let (finished, open): (Vec<_>, Vec<_>) = mem::take(&mut self.open)
            .into_iter()
            .partition(|connection| connection.thread.is_finished());
        self.open = open;
        finished.into_iter().for_each(Connection::join);
    }

    /// Connections whose thread has not been joined yet.
    pub(crate) fn len(&self) -> usize {
        self.open.len()
    }

    /// Shuts every open socket down and waits for its thread.
    ///
    /// Returns how many connections were still open.
    pub(crate) fn close_all(&mut self) -> usize {
        self.reap();
        let open = mem::take(&mut self.open);
        for connection in &open {
            if let Err(error) = connection.control.shutdown() {
                debug!(
                    target: LISTENER_TARGET,
                    connection = connection.id,
                    error = %error,
                    "socket shutdown failed"
                );
            }
        }
        let closed = open.len();
        open.into_iter().for_each(Connection::join);
        closed
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::transport::test_utils::{DrainingHandler, wait_for_count};

    fn accepted_pair(listener: &TcpListener) -> (ConnectionStream, TcpStream) {
        let addr = listener.local_addr().expect("listener address");
        let client = TcpStream::connect(addr).expect("connect client");
        let (server, _) = listener.accept().expect("accept connection");
        (ConnectionStream::Tcp(server), client)
    }

    #[test]
    fn close_all_ends_blocked_connections() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let (started, finished, handler) = DrainingHandler::new();
        let mut set = ConnectionSet::default();
        let mut clients = Vec::new();
        for _ in 0..2 {
            let (server, client) = accepted_pair(&listener);
            set.serve(server, &handler).expect("serve connection");
            clients.push(client);
        }
        assert!(wait_for_count(&started, 2), "both connections served");

        assert_eq!(set.close_all(), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert_eq!(set.len(), 0);
        for mut client in clients {
            let mut buf = Vec::new();
            assert_eq!(client.read_to_end(&mut buf).expect("read to end"), 0);
        }
    }

    #[test]
    fn reap_forgets_finished_connections() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let (_, finished, handler) = DrainingHandler::new();
        let mut set = ConnectionSet::default();
        let (server, client) = accepted_pair(&listener);
        set.serve(server, &handler).expect("serve connection");
        drop(client);
        assert!(wait_for_count(&finished, 1), "connection ended");

        let deadline = Instant::now() + Duration::from_secs(2);
        while set.len() > 0 && Instant::now() < deadline {
            set.reap();
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(set.len(), 0);
    }
}
