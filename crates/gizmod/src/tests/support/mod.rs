//! Harness utilities shared by the daemon behaviour suites.

mod client;
mod config_loader;
mod doubles;
mod harness;
mod reporter;

pub use client::TestClient;
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use harness::DaemonRunner;
pub use reporter::{HealthEvent, RecordingHealthReporter};
