//! Failures of the host supervisor.
//!
//! [`LaunchError`] names the startup stage that failed; [`GuardError`] covers
//! the lock, pid and health files of the runtime directory.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTimeError;

use nix::errno::Errno;
use thiserror::Error;

use ortho_config::OrthoError;

use gizmo_config::{RuntimeFile, RuntimePathsError, SocketPreparationError};

use crate::bootstrap::BootstrapError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Why the host stopped before, or while, serving controllers.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration layers could not be merged.
    #[error("configuration rejected: {source}")]
    Config {
        /// Loader error shared with the caller.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The socket's parent directory could not be prepared.
    #[error("cannot prepare the controller socket: {source}")]
    SocketDirectory {
        /// Filesystem error.
        #[source]
        source: SocketPreparationError,
    },
    /// No runtime directory could be resolved or created.
    #[error("cannot use runtime directory: {source}")]
    RuntimeDirectory {
        /// Resolution error.
        #[from]
        source: RuntimePathsError,
    },
    /// The runtime directory is owned by another host or is unwritable.
    #[error(transparent)]
    Guard(#[from] GuardError),
    /// Shutdown signal handlers could not be installed.
    #[error("cannot watch for shutdown signals: {source}")]
    Signals {
        /// Installation error.
        #[from]
        source: ShutdownError,
    },
    /// The document store or dispatcher could not be built.
    #[error("host bootstrap failed: {source}")]
    Bootstrap {
        /// Bootstrap error.
        #[from]
        source: BootstrapError,
    },
    /// The controller socket could not be bound or served.
    #[error("controller listener failed: {source}")]
    Listener {
        /// Listener error.
        #[from]
        source: ListenerError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<SocketPreparationError> for LaunchError {
    fn from(source: SocketPreparationError) -> Self {
        Self::SocketDirectory { source }
    }
}

/// Failures while owning the runtime directory.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The lock file could not be created.
    #[error("cannot create lock '{}': {source}", .path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A live process recorded in the pid file still owns the lock.
    #[error("another gizmod (pid {pid}) owns the runtime directory")]
    HeldBy {
        /// Pid read from the pid file.
        pid: u32,
    },
    /// A file left behind by a dead host could not be removed.
    #[error("cannot clear stale {} file '{}': {}", .file.label(), .path.display(), .source)]
    Reclaim {
        /// Which runtime file.
        file: RuntimeFile,
        /// Its location.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the pid or health file failed.
    #[error("cannot write {} file '{}': {}", .file.label(), .path.display(), .source)]
    Write {
        /// Which runtime file.
        file: RuntimeFile,
        /// Its location.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The health snapshot could not be encoded.
    #[error("cannot encode health snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    /// The system clock is before the Unix epoch.
    #[error("cannot timestamp health snapshot: {0}")]
    Clock(#[from] SystemTimeError),
    /// Signalling the recorded pid failed for a reason other than absence.
    #[error("cannot check recorded pid {pid}: {source}")]
    Liveness {
        /// Pid that was checked.
        pid: u32,
        /// Errno from `kill(pid, 0)`.
        #[source]
        source: Errno,
    },
    /// A health snapshot was requested before the pid was recorded.
    #[error("health snapshot requested before the pid file was written")]
    PidUnknown,
}
