//! Owned document state and its persistence.

mod document;
mod errors;
mod persistence;
mod queue;

pub use self::document::DocumentStore;
pub use self::errors::{PersistenceError, StoreError};
pub use self::persistence::{DocumentPersistence, JsonFilePersistence, MemoryPersistence};
pub use self::queue::PersistenceQueue;

pub(crate) const STORE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::store");
