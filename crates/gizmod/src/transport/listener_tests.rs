//! Tests for the socket listener.

use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::{fixture, rstest};

use gizmo_config::SocketEndpoint;

use super::listener::SocketListener;
use super::test_utils::{DrainingHandler, wait_for_count};
use super::{ConnectionHandler, CountingHandler, ListenerError};

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

struct CountingFixture {
    count: Arc<AtomicUsize>,
    handler: Arc<dyn ConnectionHandler>,
}

#[fixture]
fn counting_fixture() -> CountingFixture {
    let (count, handler) = CountingHandler::new();
    CountingFixture { count, handler }
}

#[fixture]
fn tcp_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", 0)
}

#[rstest]
fn tcp_listener_accepts_connections(
    tcp_endpoint: SocketEndpoint,
    counting_fixture: CountingFixture,
) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener
        .local_addr()
        .expect("listener should report local address");
    assert_ne!(addr.port(), 0, "ephemeral port should be resolved");
    let CountingFixture { count, handler } = counting_fixture;
    let handle = listener.start(handler).expect("start listener");

    TcpStream::connect(addr).expect("connect first client");
    TcpStream::connect(addr).expect("connect second client");

    assert!(wait_for_count(&count, 2), "expected two connections");
    handle.shutdown();
    handle.join().expect("join listener");
}

#[rstest]
fn stopping_closes_open_connections(tcp_endpoint: SocketEndpoint) {
    let listener = SocketListener::bind(&tcp_endpoint).expect("bind tcp listener");
    let addr = listener.local_addr().expect("listener address");
    let (started, finished, handler) = DrainingHandler::new();
    let handle = listener.start(handler).expect("start listener");

    let mut clients = vec![
        TcpStream::connect(addr).expect("connect first client"),
        TcpStream::connect(addr).expect("connect second client"),
    ];
    assert!(wait_for_count(&started, 2), "both connections served");

    handle.shutdown();
    assert_eq!(handle.join().expect("join listener"), 2);
    assert_eq!(finished.load(Ordering::SeqCst), 2);
    for client in &mut clients {
        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).expect("read to end"), 0);
    }
}

#[rstest]
fn tcp_listener_refuses_port_in_use(tcp_endpoint: SocketEndpoint) {
    let first = SocketListener::bind(&tcp_endpoint).expect("bind first listener");
    let port = first
        .local_addr()
        .map(|addr| addr.port())
        .expect("first listener port");
    let error = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", port))
        .expect_err("second bind should fail");
    assert!(matches!(error, ListenerError::Bind { .. }));
}

#[cfg(unix)]
#[rstest]
fn unix_listener_cleans_stale_socket_files(counting_fixture: CountingFixture) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("gizmod.sock");
    {
        let _stale = UnixListener::bind(&path).expect("bind stale listener");
    }
    assert!(path.exists(), "stale socket should remain");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let listener = SocketListener::bind(&endpoint).expect("bind new listener");
    let CountingFixture { count, handler } = counting_fixture;
    let handle = listener.start(handler).expect("start listener");

    UnixStream::connect(&path).expect("connect unix client");
    assert!(wait_for_count(&count, 1), "expected one connection");

    handle.shutdown();
    handle.join().expect("join listener");
    assert!(
        !path.exists(),
        "listener should remove unix socket on shutdown"
    );
}

#[cfg(unix)]
#[test]
fn unix_listener_rejects_in_use_socket() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("gizmod.sock");
    let _existing = UnixListener::bind(&path).expect("bind existing listener");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
    assert!(matches!(error, ListenerError::SocketInUse { .. }));
}

#[cfg(unix)]
#[test]
fn unix_listener_rejects_regular_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("gizmod.sock");
    std::fs::write(&path, b"not a socket").expect("write file");

    let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
    let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
    assert!(matches!(error, ListenerError::NotASocket { .. }));
}
