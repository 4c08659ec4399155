//! Background writer decoupling mutations from disk latency.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use gizmo_protocol::Document;

use super::{DocumentPersistence, PersistenceError, STORE_TARGET};

enum Command {
    Persist(Box<Document>),
    Flush(Sender<()>),
}

/// Queues snapshots for a writer thread that owns the real sink.
///
/// Bursts of snapshots collapse to the newest one before hitting the sink.
pub struct PersistenceQueue {
    sink: Arc<dyn DocumentPersistence>,
    sender: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceQueue {
    /// Starts the writer thread in front of `sink`.
    pub fn spawn(sink: Arc<dyn DocumentPersistence>) -> Result<Self, PersistenceError> {
        let (sender, receiver) = mpsc::channel();
        let worker_sink = Arc::clone(&sink);
        let worker = thread::Builder::new()
            .name(String::from("gizmod-persist"))
            .spawn(move || run_writer(&receiver, worker_sink.as_ref()))
            .map_err(PersistenceError::Worker)?;
        Ok(Self {
            sink,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Blocks until every snapshot queued so far has been written.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        let (ack, done) = mpsc::channel();
        self.send(Command::Flush(ack))?;
        done.recv().map_err(|_| PersistenceError::Closed)
    }

    /// Flushes outstanding snapshots, then stops the writer.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        drop(sender);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(worker) = worker
            && worker.join().is_err()
        {
            warn!(target: STORE_TARGET, "persistence writer panicked");
        }
    }

    fn send(&self, command: Command) -> Result<(), PersistenceError> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| PersistenceError::Closed)?;
        let sender = guard.as_ref().ok_or(PersistenceError::Closed)?;
        sender.send(command).map_err(|_| PersistenceError::Closed)
    }
}

impl DocumentPersistence for PersistenceQueue {
    fn load(&self) -> Result<Option<Document>, PersistenceError> {
        self.sink.load()
    }

    fn persist(&self, document: &Document) -> Result<(), PersistenceError> {
        self.send(Command::Persist(Box::new(document.clone())))
    }
}

impl Drop for PersistenceQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PersistenceQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceQueue").finish_non_exhaustive()
    }
}

fn run_writer(receiver: &Receiver<Command>, sink: &dyn DocumentPersistence) {
    while let Ok(command) = receiver.recv() {
        let (mut latest, mut acks) = match command {
            Command::Persist(document) => (Some(document), Vec::new()),
            Command::Flush(ack) => (None, vec![ack]),
        };
        let mut coalesced = 0_usize;
        loop {
            match receiver.try_recv() {
                Ok(Command::Persist(document)) => {
                    if latest.replace(document).is_some() {
                        coalesced += 1;
                    }
                }
                Ok(Command::Flush(ack)) => acks.push(ack),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if let Some(document) = latest {
            write_snapshot(sink, &document, coalesced);
        }
        for ack in acks {
            // The flusher may have given up waiting.
            let _ = ack.send(());
        }
    }
    debug!(target: STORE_TARGET, "persistence writer stopped");
}

fn write_snapshot(sink: &dyn DocumentPersistence, document: &Document, coalesced: usize) {
    match sink.persist(document) {
        Ok(()) => debug!(
            target: STORE_TARGET,
            pages = document.pages.len(),
            coalesced,
            "document persisted"
        ),
        Err(error) => warn!(
            target: STORE_TARGET,
            error = %error,
            "failed to persist document"
        ),
    }
}

#[cfg(test)]
mod tests {
    use gizmo_protocol::Page;

    use super::*;
    use crate::store::MemoryPersistence;

    fn document_with_pages(count: usize) -> Document {
        Document {
            pages: (0..count)
                .map(|index| Page::new(format!("p{index}"), format!("Page {index}")))
                .collect(),
            remembered_apps: Vec::new(),
        }
    }

    #[test]
    fn flush_writes_newest_snapshot() {
        let memory = Arc::new(MemoryPersistence::default());
        let queue = PersistenceQueue::spawn(memory.clone()).expect("spawn queue");
        for count in 1..=20 {
            queue.persist(&document_with_pages(count)).expect("enqueue");
        }
        queue.flush().expect("flush");
        assert_eq!(memory.last(), Some(document_with_pages(20)));
        assert!(memory.write_count() <= 20);
    }

    #[test]
    fn shutdown_drains_pending_snapshots() {
        let memory = Arc::new(MemoryPersistence::default());
        let queue = PersistenceQueue::spawn(memory.clone()).expect("spawn queue");
        queue.persist(&document_with_pages(3)).expect("enqueue");
        queue.shutdown();
        assert_eq!(memory.last(), Some(document_with_pages(3)));
        assert!(matches!(
            queue.persist(&document_with_pages(1)),
            Err(PersistenceError::Closed)
        ));
    }

    #[test]
    fn load_reads_through_to_sink() {
        let memory = Arc::new(MemoryPersistence::with_document(document_with_pages(2)));
        let queue = PersistenceQueue::spawn(memory).expect("spawn queue");
        assert_eq!(queue.load().expect("load"), Some(document_with_pages(2)));
    }
}
