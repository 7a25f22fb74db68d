pub mod error;
pub mod models;
pub mod queries;
pub mod store;

use std::path::Path;

pub use error::{Result, StoreError};
pub use store::FlatStore;

use models::Document;

/// Repository facade over the flat store.
///
/// Nothing is cached between calls: every query re-reads the whole document
/// and every mutation is a read-merge-write transaction.
pub struct Database {
    store: FlatStore,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            store: FlatStore::open(path)?,
        })
    }

    /// Drop every record. Used by dev mode.
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    pub fn with_doc<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Option<&Document>) -> Result<T>,
    {
        self.store.view(f)
    }

    pub fn with_doc_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        self.store.update(f)
    }
}
