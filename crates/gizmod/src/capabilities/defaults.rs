//! Standalone collaborator implementations.

use std::process::{Command, Stdio};

use tracing::{debug, info};

use gizmo_protocol::{Action, AppInfo};

use super::{
    ActionRunner, AppInventory, CAPABILITY_TARGET, CapabilityError, FocusNotifier, FocusSource,
    IconRasterizer, ServiceAdvertisement, ServiceAdvertiser, ShortcutCatalog,
};

const SHORTCUTS_PROGRAM: &str = "shortcuts";

/// Drives the `shortcuts` command-line tool.
#[derive(Debug, Clone)]
pub struct ShortcutsCli {
    program: String,
}

impl ShortcutsCli {
    /// Uses `program` in place of `shortcuts`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs the shortcut called `name` and waits for it to finish.
    pub fn run_shortcut(&self, name: &str) -> Result<(), CapabilityError> {
        info!(
            target: CAPABILITY_TARGET,
            shortcut = name,
            "running shortcut"
        );
        let status = Command::new(&self.program)
            .args(["run", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|source| self.spawn_error(source))?;
        if status.success() {
            Ok(())
        } else {
            Err(CapabilityError::ExitStatus {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> CapabilityError {
        CapabilityError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl Default for ShortcutsCli {
    fn default() -> Self {
        Self::with_program(SHORTCUTS_PROGRAM)
    }
}

impl ShortcutCatalog for ShortcutsCli {
    fn shortcuts(&self) -> Result<Vec<String>, CapabilityError> {
        let output = Command::new(&self.program)
            .arg("list")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| self.spawn_error(source))?;
        if !output.status.success() {
            return Err(CapabilityError::ExitStatus {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }
}

/// Runs shortcuts through [`ShortcutsCli`] and rejects every other kind.
#[derive(Debug, Clone, Default)]
pub struct CliActionRunner {
    shortcuts: ShortcutsCli,
}

impl CliActionRunner {
    /// Builds a runner backed by `shortcuts`.
    #[must_use]
    pub fn new(shortcuts: ShortcutsCli) -> Self {
        Self { shortcuts }
    }
}

impl ActionRunner for CliActionRunner {
    fn run(&self, action: &Action) -> Result<(), CapabilityError> {
        match action {
            Action::RunShortcut { shortcut_name } => self.shortcuts.run_shortcut(shortcut_name),
            other => Err(CapabilityError::Unsupported { kind: other.kind() }),
        }
    }
}

/// Inventory reporting no installed applications.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyAppInventory;

impl AppInventory for EmptyAppInventory {
    fn installed_applications(&self) -> Result<Vec<AppInfo>, CapabilityError> {
        Ok(Vec::new())
    }
}

/// Rasteriser that never produces an icon.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIconRasterizer;

impl IconRasterizer for NoIconRasterizer {
    fn rasterize(&self, _app: &AppInfo) -> Option<Vec<u8>> {
        None
    }
}

/// Advertiser that only records the advertisement in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAdvertiser;

impl ServiceAdvertiser for LoggingAdvertiser {
    fn advertise(&self, advertisement: &ServiceAdvertisement) -> Result<(), CapabilityError> {
        info!(
            target: CAPABILITY_TARGET,
            name = %advertisement.name,
            service_type = %advertisement.service_type,
            port = ?advertisement.port,
            "service advertisement requested"
        );
        Ok(())
    }
}

/// Focus source that never reports a change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFocusSource;

impl FocusSource for NoFocusSource {
    fn subscribe(&self, _notifier: FocusNotifier) -> Result<(), CapabilityError> {
        debug!(
            target: CAPABILITY_TARGET,
            "no focus source configured; focus broadcasts disabled"
        );
        Ok(())
    }
}
