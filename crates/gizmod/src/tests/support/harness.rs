//! Runs the full daemon on a background thread for behaviour scenarios.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::bootstrap::BootstrapDeps;
use crate::health::HealthReporter;
use crate::process::LaunchError;
use crate::process::launch::{HostIntegrations, LaunchPlan, ServiceDeps, run_daemon_with};

use super::client::TestClient;
use super::config_loader::TestConfigLoader;
use super::doubles::{RecordingAdvertiser, RecordingFocusSource, TestShutdownSignal};
use super::reporter::RecordingHealthReporter;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Owns a daemon launched through the production launch path.
pub struct DaemonRunner {
    pub loader: TestConfigLoader,
    pub reporter: Arc<RecordingHealthReporter>,
    pub focus: Arc<RecordingFocusSource>,
    pub advertiser: Arc<RecordingAdvertiser>,
    shutdown: TestShutdownSignal,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
}

impl DaemonRunner {
    pub fn new(loader: TestConfigLoader) -> Self {
        Self {
            loader,
            reporter: Arc::new(RecordingHealthReporter::default()),
            focus: Arc::new(RecordingFocusSource::default()),
            advertiser: Arc::new(RecordingAdvertiser::default()),
            shutdown: TestShutdownSignal::new(),
            handle: None,
            result: None,
        }
    }

    fn plan(&self, shutdown: TestShutdownSignal) -> LaunchPlan<TestConfigLoader, TestShutdownSignal> {
        LaunchPlan {
            shutdown,
            services: ServiceDeps {
                loader: self.loader.clone(),
                reporter: self.reporter.clone() as Arc<dyn HealthReporter>,
                bootstrap: BootstrapDeps::default(),
                host: HostIntegrations {
                    advertiser: self.advertiser.clone(),
                    focus: self.focus.clone(),
                },
            },
        }
    }

    /// Starts the daemon and waits until it reports ready.
    pub fn start(&mut self) -> Result<(), String> {
        if self.handle.is_some() {
            return Err(String::from("daemon already running"));
        }
        self.shutdown = TestShutdownSignal::new();
        self.result = None;
        let plan = self.plan(self.shutdown.clone());
        self.handle = Some(thread::spawn(move || run_daemon_with(plan)));
        self.wait_for_ready()
    }

    /// Runs a second daemon against the same configuration to completion.
    pub fn run_again(&self) -> Result<(), LaunchError> {
        let shutdown = TestShutdownSignal::new();
        shutdown.trigger();
        run_daemon_with(self.plan(shutdown))
    }

    pub fn stop(&mut self) -> Result<(), String> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| String::from("daemon not running"))?;
        self.shutdown.trigger();
        match handle.join() {
            Ok(result) => {
                self.result = Some(result);
                Ok(())
            }
            Err(_) => Err(String::from("daemon thread panicked")),
        }
    }

    pub fn last_result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }

    pub fn connect(&self) -> Result<TestClient, String> {
        TestClient::connect(&self.loader.socket_path()).map_err(|error| error.to_string())
    }

    pub fn read_health(&self) -> Result<Value, String> {
        let path = self.loader.runtime_dir().join("gizmod.health");
        let content = fs::read_to_string(path).map_err(|error| error.to_string())?;
        serde_json::from_str(&content).map_err(|error| error.to_string())
    }

    fn wait_for_ready(&self) -> Result<(), String> {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            let ready = self
                .read_health()
                .map(|snapshot| snapshot.get("status").and_then(Value::as_str) == Some("ready"))
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            if self.handle.as_ref().is_some_and(thread::JoinHandle::is_finished) {
                return Err(String::from("daemon exited before becoming ready"));
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(String::from("daemon did not publish ready health snapshot"))
    }
}

impl Drop for DaemonRunner {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}
