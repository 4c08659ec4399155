//! Host daemon for Gizmo controllers.
//!
//! Controllers connect over the configured socket, exchange newline-delimited
//! JSON envelopes, and edit a shared document of pages holding executors
//! bound to host actions. The daemon persists that document, runs actions on
//! request, and pushes focused-application changes to every session.
//!
//! Startup follows [`run_daemon`]: load configuration, claim the singleton
//! lock beside the socket, bind the listener, bootstrap the document store,
//! then publish readiness and wait for a termination signal. Host-specific
//! behaviour sits behind the traits in [`capabilities`].

mod bootstrap;
pub mod capabilities;
pub mod dispatch;
mod files;
mod health;
mod process;
pub mod store;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapDeps, BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    GuardError, LaunchError, ShutdownCause, ShutdownError, ShutdownSignal, SystemShutdownSignal,
    run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
