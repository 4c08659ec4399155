//! Shared request dispatcher and focus broadcast entry point.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use gizmo_config::{Config, DEFAULT_MAX_FRAME_BYTES, DEFAULT_WRITE_TIMEOUT_MS};
use gizmo_protocol::{AppInfo, FocusedAppUpdate, Page, Request, Response};

use crate::capabilities::Capabilities;
use crate::store::DocumentStore;

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::registry::{BroadcastReport, SessionRegistry};
use super::router::RequestRouter;
use super::store_manager::StoreManager;

/// Per-session limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Largest frame buffered before the peer is disconnected.
    pub max_frame_bytes: usize,
    /// Bound on a single socket write.
    pub write_timeout: Duration,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_frame_bytes: config.max_frame_bytes(),
            write_timeout: config.write_timeout(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
        }
    }
}

#[derive(Debug)]
struct Shared {
    store: StoreManager,
    sessions: SessionRegistry,
    capabilities: Capabilities,
    settings: SessionSettings,
}

/// Cloneable handle shared by every session.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new(store: DocumentStore, capabilities: Capabilities, settings: SessionSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: StoreManager::new(store),
                sessions: SessionRegistry::new(),
                capabilities,
                settings,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &StoreManager {
        &self.shared.store
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.shared.sessions
    }

    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.shared.settings
    }

    /// Snapshot of every page.
    pub fn pages(&self) -> Result<Vec<Page>, DispatchError> {
        self.shared.store.with_store(|store| store.pages().to_vec())
    }

    /// Serves one decoded request.
    pub fn dispatch(&self, request: Request) -> Option<Response> {
        RequestRouter::new(&self.shared.store, &self.shared.capabilities).route(request)
    }

    /// Decodes and serves one inbound frame.
    ///
    /// Decode failures produce an `error` response; the session stays open.
    pub fn handle_frame(&self, frame: &[u8]) -> Option<Response> {
        match Request::decode(frame) {
            Ok(request) => self.dispatch(request),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "rejecting undecodable frame"
                );
                Some(Response::for_decode_error(&error))
            }
        }
    }

    /// Announces a foreground application change to every session.
    ///
    /// Unknown applications are remembered (and persisted) first.
    pub fn broadcast_focused_app(&self, app_info: AppInfo) -> BroadcastReport {
        match self
            .shared
            .store
            .with_store(|store| store.remember_app(app_info.clone()))
        {
            Ok(true) => debug!(
                target: DISPATCH_TARGET,
                bundle_id = %app_info.bundle_id,
                "remembered focused app"
            ),
            Ok(false) => {}
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                error = %error,
                "failed to remember focused app"
            ),
        }
        let response = Response::FocusedAppUpdated(FocusedAppUpdate {
            app_info: app_info.clone(),
        });
        let frame = match response.to_frame() {
            Ok(frame) => frame,
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "failed to encode focus broadcast"
                );
                return BroadcastReport::default();
            }
        };
        let report = self.shared.sessions.broadcast(&frame);
        info!(
            target: DISPATCH_TARGET,
            bundle_id = %app_info.bundle_id,
            delivered = report.delivered,
            failed = report.failed,
            "focused app broadcast"
        );
        report
    }

    /// Handle for a focus source to report changes through.
    #[must_use]
    pub fn focus_notifier(&self) -> FocusNotifier {
        FocusNotifier {
            dispatcher: self.clone(),
        }
    }
}

/// Handle through which a [`FocusSource`](crate::capabilities::FocusSource)
/// reports foreground application changes.
#[derive(Debug, Clone)]
pub struct FocusNotifier {
    dispatcher: Dispatcher,
}

impl FocusNotifier {
    /// Reports that `app_info` is now in the foreground.
    pub fn notify(&self, app_info: AppInfo) -> BroadcastReport {
        self.dispatcher.broadcast_focused_app(app_info)
    }
}

#[cfg(test)]
mod tests {
    use gizmo_protocol::{
        Document, INVALID_MESSAGE_FORMAT, UNSUPPORTED_MESSAGE_TYPE,
    };
    use rstest::{fixture, rstest};

    use super::*;
    use crate::store::MemoryPersistence;

    struct Fixture {
        dispatcher: Dispatcher,
        memory: Arc<MemoryPersistence>,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let memory = Arc::new(MemoryPersistence::default());
        let store = DocumentStore::new(Document::default(), memory.clone(), 16);
        Fixture {
            dispatcher: Dispatcher::new(store, Capabilities::default(), SessionSettings::default()),
            memory,
        }
    }

    #[rstest]
    #[case::unknown_tag(br#"{"type":"selfDestruct"}"#.as_slice(), UNSUPPORTED_MESSAGE_TYPE)]
    #[case::response_tag(br#"{"type":"pagesList"}"#.as_slice(), UNSUPPORTED_MESSAGE_TYPE)]
    #[case::garbage(b"{{{".as_slice(), INVALID_MESSAGE_FORMAT)]
    #[case::bad_payload(br#"{"type":"deletePage","payload":"!!"}"#.as_slice(), INVALID_MESSAGE_FORMAT)]
    fn undecodable_frames_yield_error_responses(
        fixture: Fixture,
        #[case] frame: &[u8],
        #[case] expected: &str,
    ) {
        assert_eq!(
            fixture.dispatcher.handle_frame(frame),
            Some(Response::error(expected))
        );
    }

    #[rstest]
    fn focus_broadcast_remembers_new_apps_once(fixture: Fixture) {
        let notifier = fixture.dispatcher.focus_notifier();
        let app = AppInfo::new("Safari", "com.apple.Safari");
        assert_eq!(notifier.notify(app.clone()), BroadcastReport::default());
        notifier.notify(app);
        let remembered = fixture
            .dispatcher
            .store()
            .with_store(|store| store.remembered_apps().len())
            .expect("store access");
        assert_eq!(remembered, 1);
        assert_eq!(fixture.memory.write_count(), 1);
    }
}
