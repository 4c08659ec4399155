//! Singleton ownership of the runtime directory.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::Serialize;
use tracing::{info, warn};

use gizmo_config::{RuntimeFile, RuntimePaths};

use super::PROCESS_TARGET;
use super::errors::GuardError;
use crate::files::atomic_write;

/// Holds the lock file and owns the pid and health files beside it.
///
/// Dropping the guard removes every runtime file.
#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    /// Takes the lock, reclaiming it from a host that died without cleaning up.
    pub(super) fn acquire(paths: RuntimePaths) -> Result<Self, GuardError> {
        let lock = match create_lock(&paths)? {
            Some(lock) => lock,
            None => {
                reclaim_if_stale(&paths)?;
                create_lock(&paths)?.ok_or_else(|| GuardError::Lock {
                    path: paths.file(RuntimeFile::Lock),
                    source: io::Error::from(io::ErrorKind::AlreadyExists),
                })?
            }
        };
        info!(
            target: PROCESS_TARGET,
            dir = %paths.dir().display(),
            "runtime directory locked"
        );
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(super) fn write_pid(&mut self, pid: u32) -> Result<(), GuardError> {
        self.write(RuntimeFile::Pid, format!("{pid}\n").as_bytes())?;
        self.pid = Some(pid);
        Ok(())
    }

    pub(super) fn write_health(&self, state: HealthState) -> Result<(), GuardError> {
        let pid = self.pid.ok_or(GuardError::PidUnknown)?;
        let snapshot = HealthSnapshot {
            status: state,
            pid,
            timestamp: SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
        };
        let mut contents = serde_json::to_vec(&snapshot)?;
        contents.push(b'\n');
        self.write(RuntimeFile::Health, &contents)
    }

    fn write(&self, file: RuntimeFile, contents: &[u8]) -> Result<(), GuardError> {
        let path = self.paths.file(file);
        atomic_write(&path, contents).map_err(|source| GuardError::Write {
            file,
            path: path.clone(),
            source,
        })?;
        info!(
            target: PROCESS_TARGET,
            file = file.label(),
            path = %path.display(),
            "runtime file updated"
        );
        Ok(())
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (file, path) in self.paths.files() {
            if let Err(error) = remove_if_present(&path) {
                warn!(
                    target: PROCESS_TARGET,
                    file = file.label(),
                    path = %path.display(),
                    error = %error,
                    "failed to remove runtime file"
                );
            }
        }
    }
}

/// Supervisor state published in the health file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum HealthState {
    Starting,
    Ready,
    Stopping,
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: HealthState,
    pid: u32,
    timestamp: u64,
}

/// Creates the lock exclusively; `None` when it already exists.
fn create_lock(paths: &RuntimePaths) -> Result<Option<File>, GuardError> {
    let path = paths.file(RuntimeFile::Lock);
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    match options.open(&path) {
        Ok(file) => Ok(Some(file)),
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(source) => Err(GuardError::Lock { path, source }),
    }
}

/// Clears every runtime file unless the recorded owner is still alive.
fn reclaim_if_stale(paths: &RuntimePaths) -> Result<(), GuardError> {
    let recorded = fs::read_to_string(paths.file(RuntimeFile::Pid))
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok());
    if let Some(pid) = recorded
        && is_alive(pid)?
    {
        info!(target: PROCESS_TARGET, pid, "runtime directory owned by a live host");
        return Err(GuardError::HeldBy { pid });
    }
    warn!(
        target: PROCESS_TARGET,
        dir = %paths.dir().display(),
        recorded_pid = ?recorded,
        "reclaiming runtime files of a host that is no longer running"
    );
    for (file, path) in paths.files() {
        remove_if_present(&path).map_err(|source| GuardError::Reclaim {
            file,
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

fn remove_if_present(path: &std::path::Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Sends signal 0; a pid we may not signal still belongs to a live process.
fn is_alive(pid: u32) -> Result<bool, GuardError> {
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return Ok(false),
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(GuardError::Liveness { pid, source }),
    }
}

#[cfg(test)]
mod tests {
    use gizmo_config::{Config, SocketEndpoint};
    use rstest::{fixture, rstest};
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    struct Runtime {
        _dir: TempDir,
        paths: RuntimePaths,
    }

    #[fixture]
    fn runtime() -> Runtime {
        let dir = tempfile::tempdir().expect("temp dir");
        let socket = dir.path().join("gizmod.sock");
        let config = Config {
            listen_socket: SocketEndpoint::unix(socket.to_str().expect("utf8 path")),
            ..Config::default()
        };
        let paths = RuntimePaths::from_config(&config).expect("runtime paths");
        Runtime { _dir: dir, paths }
    }

    fn read_health(paths: &RuntimePaths) -> Value {
        let content = fs::read_to_string(paths.file(RuntimeFile::Health)).expect("health readable");
        serde_json::from_str(&content).expect("health parses")
    }

    #[rstest]
    fn writes_pid_and_health(runtime: Runtime) {
        let mut guard = ProcessGuard::acquire(runtime.paths.clone()).expect("lock acquired");
        guard.write_pid(4242).expect("pid written");
        guard.write_health(HealthState::Ready).expect("health written");

        let pid = fs::read_to_string(runtime.paths.file(RuntimeFile::Pid)).expect("pid readable");
        assert_eq!(pid, "4242\n");
        let health = read_health(&runtime.paths);
        assert_eq!(health["status"], "ready");
        assert_eq!(health["pid"], 4242);
        assert!(health["timestamp"].as_u64().is_some());
    }

    #[rstest]
    fn health_requires_pid(runtime: Runtime) {
        let guard = ProcessGuard::acquire(runtime.paths.clone()).expect("lock acquired");
        assert!(matches!(
            guard.write_health(HealthState::Starting),
            Err(GuardError::PidUnknown)
        ));
    }

    #[rstest]
    fn drop_removes_artefacts(runtime: Runtime) {
        {
            let mut guard = ProcessGuard::acquire(runtime.paths.clone()).expect("lock acquired");
            guard.write_pid(1).expect("pid written");
            guard.write_health(HealthState::Stopping).expect("health");
        }
        assert!(!runtime.paths.file(RuntimeFile::Lock).exists());
        assert!(!runtime.paths.file(RuntimeFile::Pid).exists());
        assert!(!runtime.paths.file(RuntimeFile::Health).exists());
    }

    #[rstest]
    #[case::zero_pid("0\n")]
    #[case::garbage("not a pid")]
    fn stale_lock_is_reclaimed(runtime: Runtime, #[case] pid: &str) {
        fs::write(runtime.paths.file(RuntimeFile::Lock), b"").expect("stale lock");
        fs::write(runtime.paths.file(RuntimeFile::Pid), pid).expect("stale pid");

        let guard = ProcessGuard::acquire(runtime.paths.clone());

        assert!(guard.is_ok(), "stale lock should be reclaimed");
        assert!(!runtime.paths.file(RuntimeFile::Pid).exists());
    }

    #[rstest]
    fn live_owner_blocks_acquisition(runtime: Runtime) {
        let current = std::process::id();
        fs::write(runtime.paths.file(RuntimeFile::Lock), b"").expect("lock");
        fs::write(runtime.paths.file(RuntimeFile::Pid), format!("{current}\n")).expect("pid");

        let error = ProcessGuard::acquire(runtime.paths.clone()).expect_err("daemon alive");

        assert!(matches!(error, GuardError::HeldBy { pid } if pid == current));
        assert!(runtime.paths.file(RuntimeFile::Lock).exists(), "live lock is left alone");
    }
}
