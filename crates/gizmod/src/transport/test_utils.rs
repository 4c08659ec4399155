//! Test helpers for the transport module.

use std::io;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::{Duration, Instant};

use super::{ConnectionHandler, ConnectionStream};

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reads each connection until it is closed by either side.
pub(crate) struct DrainingHandler {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl DrainingHandler {
    /// Returns the started and finished counters alongside the handler.
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<dyn ConnectionHandler>) {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            started: Arc::clone(&started),
            finished: Arc::clone(&finished),
        });
        (started, finished, handler)
    }
}

impl ConnectionHandler for DrainingHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _ = io::copy(&mut stream, &mut io::sink());
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if count.load(Ordering::SeqCst) >= expected {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
