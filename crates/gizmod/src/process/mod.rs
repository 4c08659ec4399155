//! Process supervision: singleton lock, runtime artefacts and shutdown.

mod errors;
mod guard;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::{GuardError, LaunchError};
pub use launch::run_daemon;
pub use shutdown::{ShutdownCause, ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
