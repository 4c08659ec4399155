//! Shared access to the document store.
//!
//! The store lives behind a single mutex. Every read and every
//! validate-then-commit sequence runs inside one closure passed to
//! [`StoreManager::with_store`], so concurrent sessions never interleave inside
//! a mutation.

use std::sync::{Arc, Mutex};

use crate::store::DocumentStore;

use super::errors::DispatchError;

/// Cloneable handle to the shared [`DocumentStore`].
#[derive(Clone, Debug)]
pub struct StoreManager {
    inner: Arc<Mutex<DocumentStore>>,
}

impl StoreManager {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Executes a closure with exclusive access to the store.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Internal` if the store lock is poisoned.
    pub fn with_store<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut DocumentStore) -> R,
    {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| DispatchError::internal("document store lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use gizmo_protocol::Document;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::store::MemoryPersistence;

    #[fixture]
    fn store_manager() -> StoreManager {
        StoreManager::new(DocumentStore::new(
            Document::default(),
            Arc::new(MemoryPersistence::default()),
            8,
        ))
    }

    #[rstest]
    fn clones_share_the_same_store(store_manager: StoreManager) {
        let cloned = store_manager.clone();
        cloned
            .with_store(|store| store.remember_app(gizmo_protocol::AppInfo::new("A", "a")))
            .expect("store access");
        let apps = store_manager
            .with_store(|store| store.remembered_apps().len())
            .expect("store access");
        assert_eq!(apps, 1);
    }

    #[rstest]
    fn poisoned_lock_is_an_internal_error(store_manager: StoreManager) {
        let poisoner = store_manager.clone();
        let joined = thread::spawn(move || {
            let _ = poisoner.with_store(|_| -> () { panic!("poison the lock") });
        })
        .join();
        assert!(joined.is_err());
        let error = store_manager
            .with_store(|_| ())
            .expect_err("lock should be poisoned");
        assert!(matches!(error, DispatchError::Internal { .. }));
    }
}
