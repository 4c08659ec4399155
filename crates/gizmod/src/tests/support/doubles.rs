//! Doubles for process-level collaborators.

use std::sync::{Arc, Condvar, Mutex};

use crate::capabilities::{
    CapabilityError, FocusNotifier, FocusSource, ServiceAdvertisement, ServiceAdvertiser,
};
use crate::process::{ShutdownCause, ShutdownError, ShutdownSignal};

/// Shutdown signal released explicitly by the test.
#[derive(Clone)]
pub struct TestShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        *triggered = true;
        cvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<ShutdownCause, ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        while !*triggered {
            triggered = cvar
                .wait(triggered)
                .expect("shutdown mutex poisoned during wait");
        }
        Ok(ShutdownCause::Requested)
    }
}

/// Focus source that hands its notifier back to the test.
#[derive(Default)]
pub struct RecordingFocusSource {
    notifier: Mutex<Option<FocusNotifier>>,
}

impl RecordingFocusSource {
    pub fn notifier(&self) -> Option<FocusNotifier> {
        self.notifier
            .lock()
            .expect("focus source mutex poisoned")
            .clone()
    }
}

impl FocusSource for RecordingFocusSource {
    fn subscribe(&self, notifier: FocusNotifier) -> Result<(), CapabilityError> {
        *self.notifier.lock().expect("focus source mutex poisoned") = Some(notifier);
        Ok(())
    }
}

/// Advertiser that records what it was asked to publish.
#[derive(Default)]
pub struct RecordingAdvertiser {
    published: Mutex<Vec<ServiceAdvertisement>>,
}

impl RecordingAdvertiser {
    pub fn published(&self) -> Vec<ServiceAdvertisement> {
        self.published
            .lock()
            .expect("advertiser mutex poisoned")
            .clone()
    }
}

impl ServiceAdvertiser for RecordingAdvertiser {
    fn advertise(&self, advertisement: &ServiceAdvertisement) -> Result<(), CapabilityError> {
        self.published
            .lock()
            .expect("advertiser mutex poisoned")
            .push(advertisement.clone());
        Ok(())
    }
}
