//! Layered configuration for the Gizmo host daemon.
//!
//! Values are merged by `ortho_config` in increasing precedence: built-in
//! defaults, a TOML file named by `--config-path` or `GIZMO_CONFIG_PATH`,
//! `GIZMO_*` environment variables, and finally command-line flags.

mod defaults;
mod logging;
mod runtime;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_FRAME_BYTES, DEFAULT_MAX_PAGE_SLOTS, DEFAULT_SERVICE_NAME,
    DEFAULT_SERVICE_TYPE, DEFAULT_TCP_HOST, DEFAULT_TCP_PORT, DEFAULT_WRITE_TIMEOUT_MS,
    default_log_filter, default_log_filter_string, default_log_format, default_max_frame_bytes,
    default_max_page_slots, default_service_name, default_service_type, default_socket_endpoint,
    default_state_path, default_write_timeout_ms,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimeFile, RuntimePaths, RuntimePathsError};
pub use socket::{
    SocketEndpoint, SocketParseError, SocketPreparationError, deserialize_endpoint,
};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "GIZMO")]
pub struct Config {
    /// Endpoint accepting client sessions.
    #[ortho_config(default = default_socket_endpoint())]
    #[serde(deserialize_with = "socket::deserialize_endpoint")]
    pub listen_socket: SocketEndpoint,
    /// File holding the persisted document.
    #[ortho_config(default = default_state_path())]
    pub state_path: Utf8PathBuf,
    /// `tracing_subscriber::EnvFilter` expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output encoding.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Service instance name published for discovery.
    #[ortho_config(default = default_service_name())]
    pub service_name: String,
    /// Service type published for discovery.
    #[ortho_config(default = default_service_type())]
    pub service_type: String,
    /// Largest inbound frame a session buffers before disconnecting the peer.
    #[ortho_config(default = default_max_frame_bytes())]
    pub max_frame_bytes: usize,
    /// Per-session socket write timeout in milliseconds.
    #[ortho_config(default = default_write_timeout_ms())]
    pub write_timeout_ms: u64,
    /// Upper bound on a page's slot count when growing for a swap.
    #[ortho_config(default = default_max_page_slots())]
    pub max_page_slots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_socket_endpoint(),
            state_path: default_state_path(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            service_name: default_service_name(),
            service_type: default_service_type(),
            max_frame_bytes: default_max_frame_bytes(),
            write_timeout_ms: default_write_timeout_ms(),
            max_page_slots: default_max_page_slots(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the program name.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint accepting client sessions.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// File holding the persisted document.
    #[must_use]
    pub fn state_path(&self) -> &Utf8Path {
        self.state_path.as_path()
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output encoding.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Service instance name published for discovery.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.service_name.as_str()
    }

    /// Service type published for discovery.
    #[must_use]
    pub fn service_type(&self) -> &str {
        self.service_type.as_str()
    }

    /// Largest inbound frame a session buffers.
    #[must_use]
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Per-session socket write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Upper bound on a page's slot count.
    #[must_use]
    pub fn max_page_slots(&self) -> usize {
        self.max_page_slots
    }
}
