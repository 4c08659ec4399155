//! Where the supervisor keeps its lock, pid and health files.
//!
//! A Unix endpoint keeps them beside the socket so one directory describes one
//! host instance. TCP endpoints fall back to a private per-user directory.

use std::env;
use std::fs::DirBuilder;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::defaults::user_namespace;
use crate::{Config, SocketEndpoint};

const RUNTIME_SUBDIR: &str = "gizmo";

/// One of the files owned by a running host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFile {
    /// Exclusive lock taken before anything else is written.
    Lock,
    /// Decimal pid of the owning process.
    Pid,
    /// JSON snapshot of the supervisor state.
    Health,
}

impl RuntimeFile {
    /// Every runtime file, in the order they are created.
    pub const ALL: [Self; 3] = [Self::Lock, Self::Pid, Self::Health];

    /// File name inside the runtime directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Lock => "gizmod.lock",
            Self::Pid => "gizmod.pid",
            Self::Health => "gizmod.health",
        }
    }

    /// Short label used in log fields.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Pid => "pid",
            Self::Health => "health",
        }
    }
}

/// Runtime directory of one host instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    dir: PathBuf,
}

impl RuntimePaths {
    /// Resolves the runtime directory for `config` and makes sure it exists.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let dir = match config.listen_socket() {
            SocketEndpoint::Unix { path } => path
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .map(|parent| parent.as_std_path().to_path_buf())
                .ok_or_else(|| RuntimePathsError::SocketWithoutParent {
                    socket: path.to_string(),
                })?,
            SocketEndpoint::Tcp { .. } => fallback_directory(),
        };
        Self::in_directory(dir)
    }

    /// Uses `dir`, creating it owner-only when missing.
    pub fn in_directory(dir: impl Into<PathBuf>) -> Result<Self, RuntimePathsError> {
        let dir = dir.into();
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&dir)
            .map_err(|source| RuntimePathsError::CreateDirectory {
                dir: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    /// The runtime directory itself.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of `file`.
    #[must_use]
    pub fn file(&self, file: RuntimeFile) -> PathBuf {
        self.dir.join(file.file_name())
    }

    /// Every runtime file with its location.
    pub fn files(&self) -> impl Iterator<Item = (RuntimeFile, PathBuf)> + '_ {
        RuntimeFile::ALL.into_iter().map(|file| (file, self.file(file)))
    }
}

fn fallback_directory() -> PathBuf {
    dirs::runtime_dir().map_or_else(
        || env::temp_dir().join(RUNTIME_SUBDIR).join(user_namespace()),
        |dir| dir.join(RUNTIME_SUBDIR),
    )
}

/// Errors raised while resolving the runtime directory.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// A relative socket name gives no directory to hold the runtime files.
    #[error("socket '{socket}' has no parent directory for runtime files")]
    SocketWithoutParent {
        /// Configured socket path.
        socket: String,
    },
    /// The runtime directory could not be created.
    #[error("failed to create runtime directory '{dir}': {source}")]
    CreateDirectory {
        /// Directory that was requested.
        dir: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
