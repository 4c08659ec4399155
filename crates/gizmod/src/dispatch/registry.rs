//! Registry of open sessions for host-originated broadcasts.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::DISPATCH_TARGET;

/// Identifier assigned to a session when it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

type Closer = Box<dyn Fn() + Send + Sync>;

/// Serialised writer half of a session.
///
/// Responses and broadcasts for one session go through the same lock so a
/// frame is never interleaved with another. The first failed write may have
/// left part of a frame on the wire, so it poisons the writer: the closer
/// runs once and every later frame is refused.
pub struct SessionWriter {
    inner: Mutex<Box<dyn Write + Send>>,
    failed: AtomicBool,
    closer: Option<Closer>,
}

impl SessionWriter {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(writer),
            failed: AtomicBool::new(false),
            closer: None,
        }
    }

    /// Runs `closer` when a write fails, typically shutting the socket down
    /// so the session's reader stops.
    #[must_use]
    pub fn with_closer(mut self, closer: impl Fn() + Send + Sync + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    /// Writes one complete frame and flushes it.
    ///
    /// # Errors
    ///
    /// Fails with the underlying error, or with `BrokenPipe` once an earlier
    /// write has failed.
    pub fn write_frame(&self, frame: &[u8]) -> io::Result<()> {
        let mut writer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if self.has_failed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "session writer failed on an earlier frame",
            ));
        }
        let result = writer.write_all(frame).and_then(|()| writer.flush());
        if result.is_err() {
            self.failed.store(true, Ordering::Release);
            if let Some(closer) = &self.closer {
                closer();
            }
        }
        result
    }

    /// Whether a write has failed on this session.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionWriter").finish_non_exhaustive()
    }
}

/// Delivery counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that received the whole frame.
    pub delivered: usize,
    /// Sessions whose write failed and which were dropped.
    pub failed: usize,
}

/// Writers of every session currently in the `Ready` state.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<BTreeMap<SessionId, Arc<SessionWriter>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, writer: Arc<SessionWriter>) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, writer);
        debug!(target: DISPATCH_TARGET, session = %id, "session registered");
        id
    }

    /// Drops the session's writer; returns whether it was still registered.
    pub fn remove(&self, id: SessionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Writes `frame` to every registered session.
    ///
    /// Writes happen outside the registry lock. A session whose write fails
    /// is logged and removed; delivery to the others continues.
    pub fn broadcast(&self, frame: &[u8]) -> BroadcastReport {
        let targets: Vec<(SessionId, Arc<SessionWriter>)> = self
            .lock()
            .iter()
            .map(|(id, writer)| (*id, Arc::clone(writer)))
            .collect();
        let mut report = BroadcastReport::default();
        for (id, writer) in targets {
            match writer.write_frame(frame) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        session = %id,
                        error = %error,
                        "broadcast write failed; dropping session"
                    );
                    self.remove(id);
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SessionId, Arc<SessionWriter>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
