use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port the host listens on.
pub const DEFAULT_TCP_PORT: u16 = 9792;

/// Default bind address; the host serves devices on the local network.
pub const DEFAULT_TCP_HOST: &str = "0.0.0.0";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default service instance name published for discovery.
pub const DEFAULT_SERVICE_NAME: &str = "GizmoHost";

/// Default service type published for discovery.
pub const DEFAULT_SERVICE_TYPE: &str = "_gizmo._tcp";

/// Default upper bound for a single inbound frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Default socket write timeout applied to every session.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 2_000;

/// Default cap on the number of slots a single page may grow to.
pub const DEFAULT_MAX_PAGE_SLOTS: usize = 1024;

const STATE_FILE_NAME: &str = "document.json";

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default listening endpoint.
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_TCP_HOST, DEFAULT_TCP_PORT)
}

/// Owned default service name.
pub fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_owned()
}

/// Owned default service type.
pub fn default_service_type() -> String {
    DEFAULT_SERVICE_TYPE.to_owned()
}

/// Default frame bound.
pub const fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

/// Default write timeout in milliseconds.
pub const fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

/// Default page slot cap.
pub const fn default_max_page_slots() -> usize {
    DEFAULT_MAX_PAGE_SLOTS
}

/// Location of the persisted document when none is configured.
///
/// Prefers the platform data directory and falls back to a per-user
/// directory under the system temporary directory.
pub fn default_state_path() -> Utf8PathBuf {
    let mut base = data_base_directory().unwrap_or_else(fallback_base_directory);
    base.push("gizmo");
    base.push(STATE_FILE_NAME);
    base
}

fn data_base_directory() -> Option<Utf8PathBuf> {
    dirs::data_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    let mut base =
        Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    base.push(user_namespace());
    base
}

#[cfg(unix)]
pub(crate) fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
pub(crate) fn user_namespace() -> String {
    String::from("user")
}
