//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use gizmo_config::{Config, SocketPreparationError};

use crate::capabilities::Capabilities;
use crate::dispatch::{Dispatcher, FocusNotifier, SessionSettings};
use crate::health::HealthReporter;
use crate::store::{
    DocumentPersistence, DocumentStore, JsonFilePersistence, PersistenceError, PersistenceQueue,
};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The stored document could not be loaded or the writer not started.
    #[error("failed to open document store: {source}")]
    Persistence {
        /// Underlying persistence error.
        #[source]
        source: PersistenceError,
    },
}

/// Collaborators injected into the bootstrap.
#[derive(Default)]
pub struct BootstrapDeps {
    /// Host collaborators used while serving requests.
    pub capabilities: Capabilities,
    /// Sink replacing the JSON file at the configured state path.
    pub persistence: Option<Arc<dyn DocumentPersistence>>,
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    telemetry: TelemetryHandle,
    dispatcher: Dispatcher,
    queue: Arc<PersistenceQueue>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Dispatcher shared by every session.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle for focus sources.
    #[must_use]
    pub fn focus_notifier(&self) -> FocusNotifier {
        self.dispatcher.focus_notifier()
    }

    /// Writes out every queued snapshot and stops the persistence writer.
    pub fn shutdown(&self) -> Result<(), PersistenceError> {
        let flushed = self.queue.flush();
        self.queue.shutdown();
        flushed
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Bootstraps the daemon using the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    deps: BootstrapDeps,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match bootstrap_inner(loader, reporter.as_ref(), deps) {
        Ok(daemon) => {
            reporter.bootstrap_succeeded(&daemon.config);
            Ok(daemon)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn bootstrap_inner(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    deps: BootstrapDeps,
) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .listen_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let BootstrapDeps {
        capabilities,
        persistence,
    } = deps;
    let sink = persistence
        .unwrap_or_else(|| Arc::new(JsonFilePersistence::new(config.state_path().to_owned())));
    let queue = Arc::new(
        PersistenceQueue::spawn(sink).map_err(|source| BootstrapError::Persistence { source })?,
    );
    let queue_sink: Arc<dyn DocumentPersistence> = queue.clone();
    let (store, restored) = DocumentStore::load(queue_sink, config.max_page_slots())
        .map_err(|source| BootstrapError::Persistence { source })?;
    reporter.document_loaded(store.pages().len(), restored);

    let dispatcher = Dispatcher::new(store, capabilities, SessionSettings::from_config(&config));
    Ok(Daemon {
        config,
        telemetry,
        dispatcher,
        queue,
    })
}
