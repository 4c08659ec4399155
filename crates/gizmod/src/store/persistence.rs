//! Where the document is loaded from and saved to.

use std::fs;
use std::io;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};

use gizmo_protocol::Document;

use super::PersistenceError;
use crate::files::atomic_write;

/// Sink receiving a snapshot after every committed mutation.
pub trait DocumentPersistence: Send + Sync {
    /// Reads the stored document, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Document>, PersistenceError>;

    /// Stores `document`, replacing any previous snapshot.
    fn persist(&self, document: &Document) -> Result<(), PersistenceError>;
}

impl<T> DocumentPersistence for Arc<T>
where
    T: DocumentPersistence + ?Sized,
{
    fn load(&self) -> Result<Option<Document>, PersistenceError> {
        self.as_ref().load()
    }

    fn persist(&self, document: &Document) -> Result<(), PersistenceError> {
        self.as_ref().persist(document)
    }
}

/// Pretty-printed JSON file replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: Utf8PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl DocumentPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<Document>, PersistenceError> {
        let bytes = match fs::read(self.path.as_std_path()) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| PersistenceError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    fn persist(&self, document: &Document) -> Result<(), PersistenceError> {
        let write_error = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path()).map_err(write_error)?;
        }
        let bytes = serde_json::to_vec_pretty(document).map_err(PersistenceError::Serialise)?;
        atomic_write(self.path.as_std_path(), &bytes).map_err(write_error)
    }
}

/// In-memory persistence recording every snapshot it receives.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    initial: Option<Document>,
    writes: Mutex<Vec<Document>>,
}

impl MemoryPersistence {
    /// Persistence whose `load` returns `document`.
    #[must_use]
    pub fn with_document(document: Document) -> Self {
        Self {
            initial: Some(document),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Every snapshot persisted so far, oldest first.
    #[must_use]
    pub fn snapshots(&self) -> Vec<Document> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.snapshots().len()
    }

    /// Most recent snapshot.
    #[must_use]
    pub fn last(&self) -> Option<Document> {
        self.snapshots().pop()
    }
}

impl DocumentPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Document>, PersistenceError> {
        Ok(self.last().or_else(|| self.initial.clone()))
    }

    fn persist(&self, document: &Document) -> Result<(), PersistenceError> {
        let mut writes = self
            .writes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writes.push(document.clone());
        Ok(())
    }
}
