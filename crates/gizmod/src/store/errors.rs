//! Errors raised by the document store.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Rejected document mutations and lookups.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No page has this id.
    #[error("page '{page_id}' not found")]
    PageNotFound {
        /// Requested page id.
        page_id: String,
    },
    /// No slot on any page holds this executor.
    #[error("executor '{executor_id}' not found")]
    ExecutorNotFound {
        /// Requested executor id.
        executor_id: String,
    },
    /// Neither the remembered nor the installed apps list this bundle.
    #[error("app '{bundle_id}' not found")]
    AppNotFound {
        /// Requested bundle id.
        bundle_id: String,
    },
    /// Another page already uses this id.
    #[error("page id '{page_id}' is already in use")]
    DuplicatePage {
        /// Clashing page id.
        page_id: String,
    },
    /// The executor id appears twice in the document.
    #[error("executor id '{executor_id}' is already in use")]
    DuplicateExecutor {
        /// Clashing executor id.
        executor_id: String,
    },
    /// Background opacity must lie in `0..=1`.
    #[error("executor '{executor_id}' has background opacity {opacity} outside 0..=1")]
    InvalidOpacity {
        /// Offending executor.
        executor_id: String,
        /// Rejected value.
        opacity: f64,
    },
    /// The page would grow past the configured slot limit.
    #[error("slot index {index} exceeds the page limit of {limit}")]
    SlotLimit {
        /// Requested index.
        index: usize,
        /// Configured `max_page_slots`.
        limit: usize,
    },
    /// The executor has no action for the resolved context.
    #[error("executor '{executor_id}' has no action for this context")]
    ActionUnbound {
        /// Executor that was triggered.
        executor_id: String,
    },
}

/// Failures loading or saving the document.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The state file exists but could not be read.
    #[error("failed to read document from {path}: {source}")]
    Read {
        /// State file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The state file could not be replaced.
    #[error("failed to write document to {path}: {source}")]
    Write {
        /// State file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The state file is not a valid document.
    #[error("document at {path} is malformed: {source}")]
    Parse {
        /// State file path.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// The document could not be encoded.
    #[error("failed to serialise document: {0}")]
    Serialise(#[source] serde_json::Error),
    /// The writer thread could not be spawned.
    #[error("failed to start persistence writer: {0}")]
    Worker(#[source] io::Error),
    /// The writer thread has already shut down.
    #[error("persistence writer is closed")]
    Closed,
}
