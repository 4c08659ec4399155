//! Maps decoded requests onto store operations and collaborators.
//!
//! Collaborator calls never run while the store lock is held: each request
//! that needs one reads what it needs in a first critical section, calls the
//! collaborator, then commits in a second critical section.

use std::fmt::Display;

use tracing::{debug, warn};

use gizmo_protocol::{
    AppIconDataResponse, AppsListResponse, CreateExecutorRequest, DeleteExecutorRequest,
    DeletePageRequest, ExecuteActionRequest, ExecutorOutcome, GetAppIconRequest, PageRequest,
    PageUpdatedResponse, PagesListResponse, Request, Response, ShortcutsListResponse,
    SwapExecutorRequest, UpdateAppInfoRequest, UpdateExecutorRequest,
};

use crate::capabilities::Capabilities;
use crate::store::StoreError;

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::store_manager::StoreManager;

/// Routes one request, returning the response to send, if any.
pub(crate) struct RequestRouter<'a> {
    store: &'a StoreManager,
    capabilities: &'a Capabilities,
}

impl<'a> RequestRouter<'a> {
    pub(crate) fn new(store: &'a StoreManager, capabilities: &'a Capabilities) -> Self {
        Self {
            store,
            capabilities,
        }
    }

    pub(crate) fn route(&self, request: Request) -> Option<Response> {
        debug!(
            target: DISPATCH_TARGET,
            message_type = %request.message_type(),
            "routing request"
        );
        match request {
            Request::ListPages => Some(self.list_pages()),
            Request::ListApps => Some(self.list_apps()),
            Request::ListShortcuts => Some(self.list_shortcuts()),
            Request::GetAppIcon(body) => self.app_icon(body),
            Request::CreatePage(body) => Some(self.create_page(body)),
            Request::ModifyPage(body) => Some(self.modify_page(body)),
            Request::DeletePage(body) => Some(self.delete_page(body)),
            Request::UpdateAppInfo(body) => {
                self.update_app_info(body);
                None
            }
            Request::CreateExecutor(body) => Some(self.create_executor(body)),
            Request::UpdateExecutor(body) => Some(self.update_executor(body)),
            Request::DeleteExecutor(body) => Some(self.delete_executor(body)),
            Request::SwapExecutor(body) => Some(self.swap_executor(body)),
            Request::ExecuteAction(body) => Some(self.execute_action(body)),
        }
    }

    fn list_pages(&self) -> Response {
        match self.store.with_store(|store| store.pages().to_vec()) {
            Ok(pages) => Response::PagesList(PagesListResponse { pages }),
            Err(error) => internal_failure("list pages", &error),
        }
    }

    fn list_apps(&self) -> Response {
        match self.capabilities.apps().installed_applications() {
            Ok(apps) => {
                if let Err(error) = self
                    .store
                    .with_store(|store| store.replace_installed_apps(apps))
                {
                    return internal_failure("list apps", &error);
                }
            }
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                error = %error,
                "application scan failed; keeping previous cache"
            ),
        }
        match self.store.with_store(|store| store.list_apps()) {
            Ok(app_infos) => Response::AppsList(AppsListResponse { app_infos }),
            Err(error) => internal_failure("list apps", &error),
        }
    }

    fn list_shortcuts(&self) -> Response {
        let shortcuts = self
            .capabilities
            .shortcuts()
            .shortcuts()
            .unwrap_or_else(|error| {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "shortcut listing failed"
                );
                Vec::new()
            });
        Response::ShortcutsList(ShortcutsListResponse { shortcuts })
    }

    fn app_icon(&self, body: GetAppIconRequest) -> Option<Response> {
        let bundle_id = body.bundle_id;
        let app = match self
            .store
            .with_store(|store| store.find_app(&bundle_id).cloned())
        {
            Ok(Ok(app)) => app,
            Ok(Err(error)) => {
                debug!(target: DISPATCH_TARGET, error = %error, "no icon to send");
                return None;
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, error = %error, "icon lookup failed");
                return None;
            }
        };
        let icon_bytes = match app.icon.clone() {
            Some(bytes) => bytes,
            None => {
                let bytes = self.capabilities.icons().rasterize(&app)?;
                let cached = flatten(
                    self.store
                        .with_store(|store| store.set_app_icon(&bundle_id, bytes.clone())),
                );
                if let Err(error) = cached {
                    debug!(target: DISPATCH_TARGET, error = %error, "icon not cached");
                }
                bytes
            }
        };
        Some(Response::AppIconData(AppIconDataResponse {
            bundle_id,
            icon_bytes,
        }))
    }

    fn create_page(&self, body: PageRequest) -> Response {
        let requested_id = body.page.id.clone();
        match flatten(self.store.with_store(|store| store.create_page(body.page))) {
            Ok(page_id) => page_updated(page_id, None),
            Err(reason) => page_updated(requested_id, Some(failure("create page", reason))),
        }
    }

    fn modify_page(&self, body: PageRequest) -> Response {
        let page_id = body.page.id.clone();
        let result = flatten(self.store.with_store(|store| store.modify_page(body.page)));
        page_updated(page_id, failure_message("modify page", result))
    }

    fn delete_page(&self, body: DeletePageRequest) -> Response {
        let page_id = body.page_id;
        let result = flatten(self.store.with_store(|store| store.delete_page(&page_id)));
        page_updated(page_id, failure_message("delete page", result))
    }

    fn update_app_info(&self, body: UpdateAppInfoRequest) {
        let bundle_id = body.app_info.bundle_id.clone();
        match self
            .store
            .with_store(|store| store.update_app_info(body.app_info))
        {
            Ok(true) => {}
            Ok(false) => debug!(
                target: DISPATCH_TARGET,
                bundle_id = %bundle_id,
                "ignoring update for unknown app"
            ),
            Err(error) => warn!(
                target: DISPATCH_TARGET,
                error = %error,
                "failed to update app info"
            ),
        }
    }

    fn create_executor(&self, body: CreateExecutorRequest) -> Response {
        let CreateExecutorRequest { executor, page_id } = body;
        let requested_id = executor.id.clone();
        let result = flatten(
            self.store
                .with_store(|store| store.create_executor(&page_id, executor)),
        );
        Response::ExecutorUpdated(match result {
            Ok(executor_id) => ExecutorOutcome::succeeded(executor_id),
            Err(reason) => ExecutorOutcome::failed(requested_id, failure("create executor", reason)),
        })
    }

    fn update_executor(&self, body: UpdateExecutorRequest) -> Response {
        let executor_id = body.executor.id.clone();
        let result = flatten(
            self.store
                .with_store(|store| store.update_executor(body.executor)),
        );
        Response::ExecutorUpdated(outcome(executor_id, "update executor", result))
    }

    fn delete_executor(&self, body: DeleteExecutorRequest) -> Response {
        let executor_id = body.executor_id;
        let result = flatten(
            self.store
                .with_store(|store| store.delete_executor(&executor_id)),
        );
        Response::ExecutorDeleted(outcome(executor_id, "delete executor", result))
    }

    fn swap_executor(&self, body: SwapExecutorRequest) -> Response {
        let SwapExecutorRequest {
            executor_id,
            page_id,
            index,
        } = body;
        let result = flatten(
            self.store
                .with_store(|store| store.swap_executor(&executor_id, &page_id, index)),
        );
        Response::ExecutorSwapped(outcome(executor_id, "swap executor", result))
    }

    fn execute_action(&self, body: ExecuteActionRequest) -> Response {
        let ExecuteActionRequest {
            executor_id,
            action_context_option,
        } = body;
        let resolved = flatten(
            self.store
                .with_store(|store| store.resolve_action(&executor_id, &action_context_option)),
        );
        let result = resolved.and_then(|action| {
            debug!(
                target: DISPATCH_TARGET,
                executor_id = %executor_id,
                action = action.kind(),
                "executing action"
            );
            self.capabilities
                .actions()
                .run(&action)
                .map_err(|error| error.to_string())
        });
        if let Err(reason) = &result {
            warn!(
                target: DISPATCH_TARGET,
                executor_id = %executor_id,
                error = %reason,
                "action failed"
            );
        }
        Response::ActionExecuted(outcome(executor_id, "execute action", result))
    }
}

fn flatten<T>(result: Result<Result<T, StoreError>, DispatchError>) -> Result<T, String> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.to_string()),
        Err(error) => Err(error.to_string()),
    }
}

fn failure(operation: &str, reason: impl Display) -> String {
    format!("Failed to {operation}: {reason}")
}

fn failure_message(operation: &str, result: Result<(), String>) -> Option<String> {
    result.err().map(|reason| failure(operation, reason))
}

fn outcome<T>(executor_id: String, operation: &str, result: Result<T, String>) -> ExecutorOutcome {
    match result {
        Ok(_) => ExecutorOutcome::succeeded(executor_id),
        Err(reason) => ExecutorOutcome::failed(executor_id, failure(operation, reason)),
    }
}

fn page_updated(page_id: String, message: Option<String>) -> Response {
    Response::PageUpdated(PageUpdatedResponse {
        page_id,
        success: message.is_none(),
        message,
    })
}

fn internal_failure(operation: &str, error: &DispatchError) -> Response {
    warn!(
        target: DISPATCH_TARGET,
        error = %error,
        operation,
        "request failed"
    );
    Response::error(failure(operation, error))
}
