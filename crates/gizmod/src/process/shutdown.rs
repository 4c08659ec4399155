//! Shutdown triggers for the supervisor.

use std::ffi::c_int;
use std::fmt;
use std::io;
use std::sync::{Mutex, PoisonError};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level::signal_name;
use thiserror::Error;

const SHUTDOWN_SIGNALS: [c_int; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Why the supervisor began shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// A process signal arrived.
    Signal(c_int),
    /// The trigger was released from inside the process.
    Requested,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(signal) => match signal_name(*signal) {
                Some(name) => f.write_str(name),
                None => write!(f, "signal {signal}"),
            },
            Self::Requested => f.write_str("request"),
        }
    }
}

/// Blocks the supervisor until the host should stop.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once shutdown should proceed, naming what triggered it.
    fn wait(&self) -> Result<ShutdownCause, ShutdownError>;
}

/// Errors reported by shutdown triggers.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Signal handlers could not be registered.
    #[error("cannot register shutdown signal handlers: {source}")]
    Register {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Signal delivery stopped before any shutdown signal arrived.
    #[error("signal delivery ended before a shutdown signal arrived")]
    Closed,
}

/// Waits for SIGTERM, SIGINT, SIGQUIT or SIGHUP.
///
/// Handlers are registered on construction, so a signal that arrives while
/// the host is still starting is delivered by the next [`wait`].
///
/// [`wait`]: ShutdownSignal::wait
pub struct SystemShutdownSignal {
    signals: Mutex<Signals>,
}

impl SystemShutdownSignal {
    /// Registers the shutdown signal handlers.
    pub fn install() -> Result<Self, ShutdownError> {
        let signals =
            Signals::new(SHUTDOWN_SIGNALS).map_err(|source| ShutdownError::Register { source })?;
        Ok(Self {
            signals: Mutex::new(signals),
        })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<ShutdownCause, ShutdownError> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals
            .forever()
            .next()
            .map(ShutdownCause::Signal)
            .ok_or(ShutdownError::Closed)
    }
}

impl fmt::Debug for SystemShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemShutdownSignal")
            .field("signals", &SHUTDOWN_SIGNALS)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use signal_hook::low_level::raise;

    use super::*;

    #[rstest]
    #[case(ShutdownCause::Signal(SIGTERM), "SIGTERM")]
    #[case(ShutdownCause::Signal(SIGHUP), "SIGHUP")]
    #[case(ShutdownCause::Requested, "request")]
    fn causes_name_their_trigger(#[case] cause: ShutdownCause, #[case] expected: &str) {
        assert_eq!(cause.to_string(), expected);
    }

    #[test]
    fn signal_raised_before_waiting_is_not_lost() {
        let shutdown = SystemShutdownSignal::install().expect("handlers registered");
        raise(SIGHUP).expect("raise SIGHUP");
        assert_eq!(
            shutdown.wait().expect("signal delivered"),
            ShutdownCause::Signal(SIGHUP)
        );
    }
}
