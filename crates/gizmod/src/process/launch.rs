//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use gizmo_config::RuntimePaths;

use crate::bootstrap::{
    BootstrapDeps, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
use crate::capabilities::{
    FocusSource, LoggingAdvertiser, NoFocusSource, ServiceAdvertisement, ServiceAdvertiser,
};
use crate::dispatch::SessionConnectionHandler;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::PROCESS_TARGET;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Host integrations started once the listener is accepting sessions.
pub(crate) struct HostIntegrations {
    pub(crate) advertiser: Arc<dyn ServiceAdvertiser>,
    pub(crate) focus: Arc<dyn FocusSource>,
}

impl Default for HostIntegrations {
    fn default() -> Self {
        Self {
            advertiser: Arc::new(LoggingAdvertiser),
            focus: Arc::new(NoFocusSource),
        }
    }
}

/// Service dependencies required to construct the daemon runtime.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) bootstrap: BootstrapDeps,
    pub(crate) host: HostIntegrations,
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) shutdown: S,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the daemon in the foreground using the production collaborators.
///
/// Signal handlers are installed first so a signal sent during startup still
/// stops the host once it is ready.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        shutdown: SystemShutdownSignal::install()?,
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
            bootstrap: BootstrapDeps::default(),
            host: HostIntegrations::default(),
        },
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
///
/// Returns once the shutdown signal fires, every open session has been
/// closed, and every queued document write has reached storage.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan { shutdown, services } = plan;
    let ServiceDeps {
        loader,
        reporter,
        bootstrap,
        host,
    } = services;

    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let config = loader.load()?;
    config.listen_socket().prepare_filesystem()?;
    let runtime_paths = RuntimePaths::from_config(&config)?;
    let mut guard = ProcessGuard::acquire(runtime_paths)?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;
    let listener = SocketListener::bind(config.listen_socket())?;
    let bound_port = listener.local_addr().map(|address| address.port());
    let endpoint = listener.endpoint().clone();

    let static_loader = StaticConfigLoader::new(config.clone());
    let daemon = bootstrap_with(&static_loader, Arc::clone(&reporter), bootstrap)?;
    let handler = Arc::new(SessionConnectionHandler::new(daemon.dispatcher().clone()));
    let listener_handle = listener.start(handler)?;
    reporter.listener_ready(&endpoint);

    let advertisement = ServiceAdvertisement::from_config(&config, bound_port);
    if let Err(error) = host.advertiser.advertise(&advertisement) {
        warn!(
            target: PROCESS_TARGET,
            error = %error,
            name = %advertisement.name,
            "service advertisement failed; clients must connect directly"
        );
    }
    if let Err(error) = host.focus.subscribe(daemon.focus_notifier()) {
        warn!(
            target: PROCESS_TARGET,
            error = %error,
            "focus tracking unavailable"
        );
    }

    guard.write_health(HealthState::Ready)?;
    let cause = shutdown.wait()?;
    info!(target: PROCESS_TARGET, cause = %cause, "shutting down");
    guard.write_health(HealthState::Stopping)?;
    listener_handle.shutdown();
    let closed_sessions = listener_handle.join()?;
    info!(
        target: PROCESS_TARGET,
        closed_sessions,
        "controller sessions closed; flushing document"
    );
    if let Err(error) = daemon.shutdown() {
        warn!(
            target: PROCESS_TARGET,
            error = %error,
            "final document flush failed"
        );
    }
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
