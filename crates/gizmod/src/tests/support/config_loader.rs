//! Test configuration loaders for scenarios covering success and failure paths.
//!
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ortho_config::OrthoError;
use tempfile::TempDir;

use gizmo_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that places the socket, runtime artefacts and document in a
/// temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    dir: Arc<TempDir>,
    max_frame_bytes: Option<usize>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory for socket");
        Self {
            dir: Arc::new(dir),
            max_frame_bytes: None,
        }
    }

    /// Caps inbound frames at `limit` bytes.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = Some(limit);
        self
    }

    pub fn runtime_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("gizmod.sock")
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("document.json")
    }

    fn utf8(path: PathBuf) -> String {
        path.to_str()
            .expect("temporary path was not valid UTF-8")
            .to_owned()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let defaults = Config::default();
        Ok(Config {
            listen_socket: SocketEndpoint::unix(Self::utf8(self.socket_path())),
            state_path: Self::utf8(self.state_path()).into(),
            max_frame_bytes: self.max_frame_bytes.unwrap_or(defaults.max_frame_bytes),
            ..defaults
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("gizmod"),
            OsString::from("--listen-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
