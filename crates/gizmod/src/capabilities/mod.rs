//! Host collaborators reached through narrow traits.
//!
//! Input injection, application enumeration, icon rasterisation, shortcut
//! discovery, focus tracking and service advertisement all depend on the host
//! platform. The daemon core only talks to these traits; [`defaults`] provides
//! implementations that keep the daemon usable standalone.

pub mod defaults;

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use gizmo_config::Config;
use gizmo_protocol::{Action, AppInfo};

pub use self::defaults::{
    CliActionRunner, EmptyAppInventory, LoggingAdvertiser, NoFocusSource, NoIconRasterizer,
    ShortcutsCli,
};
pub use crate::dispatch::FocusNotifier;

pub(crate) const CAPABILITY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::capabilities");

/// Errors reported by host collaborators.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The host cannot perform this kind of action.
    #[error("action '{kind}' is not supported on this host")]
    Unsupported {
        /// Wire tag of the rejected action.
        kind: &'static str,
    },
    /// A helper program could not be started.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A helper program exited unsuccessfully.
    #[error("'{program}' exited with {status}")]
    ExitStatus {
        /// Program that failed.
        program: String,
        /// Reported exit status.
        status: String,
    },
    /// Any other collaborator failure.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl CapabilityError {
    /// Creates a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Performs actions on the host.
#[cfg_attr(test, mockall::automock)]
pub trait ActionRunner: Send + Sync {
    /// Performs `action`, blocking until it completes.
    fn run(&self, action: &Action) -> Result<(), CapabilityError>;
}

/// Enumerates installed applications.
#[cfg_attr(test, mockall::automock)]
pub trait AppInventory: Send + Sync {
    /// Scans the host for installed applications.
    fn installed_applications(&self) -> Result<Vec<AppInfo>, CapabilityError>;
}

/// Produces icon images for applications.
#[cfg_attr(test, mockall::automock)]
pub trait IconRasterizer: Send + Sync {
    /// Rasterises the icon for `app`, or `None` when it has none.
    fn rasterize(&self, app: &AppInfo) -> Option<Vec<u8>>;
}

/// Lists shortcuts that `runShortcut` actions may name.
#[cfg_attr(test, mockall::automock)]
pub trait ShortcutCatalog: Send + Sync {
    /// Names of every available shortcut.
    fn shortcuts(&self) -> Result<Vec<String>, CapabilityError>;
}

/// Source of focused-application changes.
pub trait FocusSource: Send + Sync {
    /// Starts delivering focus changes to `notifier`.
    ///
    /// Implementations usually spawn their own watcher and return promptly.
    fn subscribe(&self, notifier: FocusNotifier) -> Result<(), CapabilityError>;
}

/// Publishes the host on the local network.
pub trait ServiceAdvertiser: Send + Sync {
    /// Starts advertising `advertisement`.
    fn advertise(&self, advertisement: &ServiceAdvertisement) -> Result<(), CapabilityError>;
}

/// What the host publishes for discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvertisement {
    /// Instance name, for example `GizmoHost`.
    pub name: String,
    /// Service type, for example `_gizmo._tcp`.
    pub service_type: String,
    /// Bound TCP port, absent for Unix sockets.
    pub port: Option<u16>,
}

impl ServiceAdvertisement {
    /// Advertisement for `config`, reporting the port actually bound.
    #[must_use]
    pub fn from_config(config: &Config, bound_port: Option<u16>) -> Self {
        Self {
            name: config.service_name().to_owned(),
            service_type: config.service_type().to_owned(),
            port: bound_port.or_else(|| config.listen_socket().tcp_port()),
        }
    }
}

/// Collaborators consulted while serving requests.
#[derive(Clone)]
pub struct Capabilities {
    actions: Arc<dyn ActionRunner>,
    apps: Arc<dyn AppInventory>,
    icons: Arc<dyn IconRasterizer>,
    shortcuts: Arc<dyn ShortcutCatalog>,
}

impl Capabilities {
    /// Replaces the action runner.
    #[must_use]
    pub fn with_actions(mut self, actions: Arc<dyn ActionRunner>) -> Self {
        self.actions = actions;
        self
    }

    /// Replaces the application inventory.
    #[must_use]
    pub fn with_apps(mut self, apps: Arc<dyn AppInventory>) -> Self {
        self.apps = apps;
        self
    }

    /// Replaces the icon rasteriser.
    #[must_use]
    pub fn with_icons(mut self, icons: Arc<dyn IconRasterizer>) -> Self {
        self.icons = icons;
        self
    }

    /// Replaces the shortcut catalogue.
    #[must_use]
    pub fn with_shortcuts(mut self, shortcuts: Arc<dyn ShortcutCatalog>) -> Self {
        self.shortcuts = shortcuts;
        self
    }

    pub(crate) fn actions(&self) -> &dyn ActionRunner {
        self.actions.as_ref()
    }

    pub(crate) fn apps(&self) -> &dyn AppInventory {
        self.apps.as_ref()
    }

    pub(crate) fn icons(&self) -> &dyn IconRasterizer {
        self.icons.as_ref()
    }

    pub(crate) fn shortcuts(&self) -> &dyn ShortcutCatalog {
        self.shortcuts.as_ref()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        let cli = ShortcutsCli::default();
        Self {
            actions: Arc::new(CliActionRunner::new(cli.clone())),
            apps: Arc::new(EmptyAppInventory),
            icons: Arc::new(NoIconRasterizer),
            shortcuts: Arc::new(cli),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
