//! The single owner of the edited document.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use gizmo_protocol::{Action, ActionContextOption, AppInfo, Document, Executor, Page};

use super::{DocumentPersistence, PersistenceError, STORE_TARGET, StoreError};

const DEFAULT_PAGE_NAME: &str = "Page 1";

/// Document state plus the installed-application cache.
///
/// Every committed mutation is followed by exactly one call to the
/// persistence sink. Rejected mutations leave the document untouched unless
/// noted otherwise.
pub struct DocumentStore {
    document: Document,
    installed_apps: Vec<AppInfo>,
    persistence: Arc<dyn DocumentPersistence>,
    max_page_slots: usize,
}

impl DocumentStore {
    /// Wraps `document`, adding a first page when it has none.
    pub fn new(
        mut document: Document,
        persistence: Arc<dyn DocumentPersistence>,
        max_page_slots: usize,
    ) -> Self {
        if document.pages.is_empty() {
            document
                .pages
                .push(Page::new(new_id(), DEFAULT_PAGE_NAME));
        }
        Self {
            document,
            installed_apps: Vec::new(),
            persistence,
            max_page_slots,
        }
    }

    /// Loads the stored document, starting fresh when nothing was saved.
    ///
    /// The returned flag reports whether a stored document was restored.
    pub fn load(
        persistence: Arc<dyn DocumentPersistence>,
        max_page_slots: usize,
    ) -> Result<(Self, bool), PersistenceError> {
        let stored = persistence.load()?;
        let restored = stored.is_some();
        let store = Self::new(stored.unwrap_or_default(), persistence, max_page_slots);
        Ok((store, restored))
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.document.pages
    }

    #[must_use]
    pub fn remembered_apps(&self) -> &[AppInfo] {
        &self.document.remembered_apps
    }

    #[must_use]
    pub fn installed_apps(&self) -> &[AppInfo] {
        &self.installed_apps
    }

    /// Appends `page`, returning its identifier.
    ///
    /// Empty page and executor ids are replaced with fresh ones.
    pub fn create_page(&mut self, mut page: Page) -> Result<String, StoreError> {
        if page.id.is_empty() {
            page.id = new_id();
        }
        fill_executor_ids(&mut page);
        if self.document.page(&page.id).is_some() {
            return Err(StoreError::DuplicatePage { page_id: page.id });
        }
        self.validate_page(&page)?;
        let page_id = page.id.clone();
        self.document.pages.push(page);
        self.persist();
        Ok(page_id)
    }

    /// Replaces the page sharing `page`'s identifier.
    ///
    /// Occupants with an empty id are given fresh ones.
    pub fn modify_page(&mut self, mut page: Page) -> Result<(), StoreError> {
        let index = self.page_index(&page.id)?;
        fill_executor_ids(&mut page);
        self.validate_page(&page)?;
        if let Some(slot) = self.document.pages.get_mut(index) {
            *slot = page;
        }
        self.persist();
        Ok(())
    }

    pub fn delete_page(&mut self, page_id: &str) -> Result<(), StoreError> {
        let index = self.page_index(page_id)?;
        self.document.pages.remove(index);
        self.persist();
        Ok(())
    }

    /// Replaces the remembered entry for `app`'s bundle id.
    ///
    /// Returns `false` without persisting when the app is not remembered. A
    /// cached icon survives the update.
    pub fn update_app_info(&mut self, mut app: AppInfo) -> bool {
        let Some(entry) = self
            .document
            .remembered_apps
            .iter_mut()
            .find(|entry| entry.bundle_id == app.bundle_id)
        else {
            return false;
        };
        if app.icon.is_none() {
            app.icon = entry.icon.take();
        }
        *entry = app;
        self.persist();
        true
    }

    /// Adds `app` to the remembered list if its bundle id is new.
    pub fn remember_app(&mut self, app: AppInfo) -> bool {
        if self.document.remembered_app(&app.bundle_id).is_some() {
            return false;
        }
        self.document.remembered_apps.push(app);
        self.persist();
        true
    }

    /// Appends `executor` to the page's slots, returning its identifier.
    pub fn create_executor(
        &mut self,
        page_id: &str,
        mut executor: Executor,
    ) -> Result<String, StoreError> {
        let index = self.page_index(page_id)?;
        if executor.id.is_empty() {
            executor.id = new_id();
        }
        if self.document.executor_id_in_use(&executor.id, None) {
            return Err(StoreError::DuplicateExecutor {
                executor_id: executor.id,
            });
        }
        check_opacity(&executor)?;
        let executor_id = executor.id.clone();
        if let Some(page) = self.document.pages.get_mut(index) {
            page.executors.push(Some(executor));
        }
        self.persist();
        Ok(executor_id)
    }

    /// Replaces the first slot holding `executor`'s identifier.
    pub fn update_executor(&mut self, executor: Executor) -> Result<(), StoreError> {
        check_opacity(&executor)?;
        let location = self.locate(&executor.id)?;
        if let Some(slot) = self.document.slot_mut(location) {
            *slot = Some(executor);
        }
        self.persist();
        Ok(())
    }

    /// Turns the executor's slot into a hole; the page keeps its length.
    pub fn delete_executor(&mut self, executor_id: &str) -> Result<(), StoreError> {
        let location = self.locate(executor_id)?;
        if let Some(slot) = self.document.slot_mut(location) {
            *slot = None;
        }
        self.persist();
        Ok(())
    }

    /// Swaps the executor's slot with `index` on `page_id`.
    ///
    /// The destination page grows with holes to cover `index` before the
    /// executor is looked up, and that growth is kept and persisted even when
    /// the executor turns out not to exist.
    pub fn swap_executor(
        &mut self,
        executor_id: &str,
        page_id: &str,
        index: usize,
    ) -> Result<(), StoreError> {
        let page_index = self.page_index(page_id)?;
        if index >= self.max_page_slots {
            return Err(StoreError::SlotLimit {
                index,
                limit: self.max_page_slots,
            });
        }
        let grew = match self.document.pages.get_mut(page_index) {
            Some(page) => {
                let before = page.executors.len();
                page.grow_to(index.saturating_add(1));
                page.executors.len() != before
            }
            None => false,
        };
        let Some(source) = self.document.locate(executor_id) else {
            if grew {
                self.persist();
            }
            return Err(StoreError::ExecutorNotFound {
                executor_id: executor_id.to_owned(),
            });
        };
        let destination = gizmo_protocol::SlotLocation {
            page: page_index,
            slot: index,
        };
        if source != destination {
            let moving = self.document.slot_mut(source).and_then(Option::take);
            let displaced = self
                .document
                .slot_mut(destination)
                .and_then(|slot| std::mem::replace(slot, moving));
            if let Some(slot) = self.document.slot_mut(source) {
                *slot = displaced;
            }
        }
        self.persist();
        Ok(())
    }

    pub fn executor(&self, executor_id: &str) -> Result<&Executor, StoreError> {
        self.document
            .executor(executor_id)
            .ok_or_else(|| StoreError::ExecutorNotFound {
                executor_id: executor_id.to_owned(),
            })
    }

    /// Action the executor performs under `option`.
    pub fn resolve_action(
        &self,
        executor_id: &str,
        option: &ActionContextOption,
    ) -> Result<Action, StoreError> {
        self.executor(executor_id)?
            .action_context
            .resolve(option)
            .cloned()
            .ok_or_else(|| StoreError::ActionUnbound {
                executor_id: executor_id.to_owned(),
            })
    }

    /// Application record for `bundle_id`, remembered apps first.
    pub fn find_app(&self, bundle_id: &str) -> Result<&AppInfo, StoreError> {
        self.document
            .remembered_app(bundle_id)
            .or_else(|| {
                self.installed_apps
                    .iter()
                    .find(|app| app.bundle_id == bundle_id)
            })
            .ok_or_else(|| StoreError::AppNotFound {
                bundle_id: bundle_id.to_owned(),
            })
    }

    /// Caches rasterised icon bytes on every record for `bundle_id`.
    ///
    /// Icons are never persisted.
    pub fn set_app_icon(&mut self, bundle_id: &str, icon: Vec<u8>) -> Result<(), StoreError> {
        let mut found = false;
        for app in self
            .document
            .remembered_apps
            .iter_mut()
            .chain(self.installed_apps.iter_mut())
            .filter(|app| app.bundle_id == bundle_id)
        {
            app.icon = Some(icon.clone());
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(StoreError::AppNotFound {
                bundle_id: bundle_id.to_owned(),
            })
        }
    }

    /// Replaces the installed-application cache, keeping cached icons.
    pub fn replace_installed_apps(&mut self, apps: Vec<AppInfo>) {
        let previous = std::mem::take(&mut self.installed_apps);
        self.installed_apps = apps
            .into_iter()
            .map(|mut app| {
                if app.icon.is_none() {
                    app.icon = previous
                        .iter()
                        .find(|old| old.bundle_id == app.bundle_id)
                        .and_then(|old| old.icon.clone());
                }
                app
            })
            .collect();
    }

    /// Applications reported to controllers.
    #[must_use]
    pub fn list_apps(&self) -> Vec<AppInfo> {
        self.document.remembered_apps.clone()
    }

    fn page_index(&self, page_id: &str) -> Result<usize, StoreError> {
        self.document
            .pages
            .iter()
            .position(|page| page.id == page_id)
            .ok_or_else(|| StoreError::PageNotFound {
                page_id: page_id.to_owned(),
            })
    }

    fn locate(&self, executor_id: &str) -> Result<gizmo_protocol::SlotLocation, StoreError> {
        self.document
            .locate(executor_id)
            .ok_or_else(|| StoreError::ExecutorNotFound {
                executor_id: executor_id.to_owned(),
            })
    }

    fn validate_page(&self, page: &Page) -> Result<(), StoreError> {
        let mut seen = BTreeSet::new();
        for executor in page.executors.iter().flatten() {
            if !seen.insert(executor.id.as_str())
                || self
                    .document
                    .executor_id_in_use(&executor.id, Some(&page.id))
            {
                return Err(StoreError::DuplicateExecutor {
                    executor_id: executor.id.clone(),
                });
            }
            check_opacity(executor)?;
        }
        Ok(())
    }

    fn persist(&self) {
        if let Err(error) = self.persistence.persist(&self.document) {
            warn!(
                target: STORE_TARGET,
                error = %error,
                "failed to persist document"
            );
        }
    }
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("pages", &self.document.pages.len())
            .field("remembered_apps", &self.document.remembered_apps.len())
            .field("installed_apps", &self.installed_apps.len())
            .field("max_page_slots", &self.max_page_slots)
            .finish_non_exhaustive()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn fill_executor_ids(page: &mut Page) {
    for executor in page.executors.iter_mut().flatten() {
        if executor.id.is_empty() {
            executor.id = new_id();
        }
    }
}

fn check_opacity(executor: &Executor) -> Result<(), StoreError> {
    if executor.has_valid_opacity() {
        Ok(())
    } else {
        Err(StoreError::InvalidOpacity {
            executor_id: executor.id.clone(),
            opacity: executor.background_opacity,
        })
    }
}
