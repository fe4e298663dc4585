//! Volatile [`AtomicBlobStore`] for tests and ephemeral vaults.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use keyvault_core::{StorageError, StorageResult};

use crate::blob_store::AtomicBlobStore;

/// In-memory [`AtomicBlobStore`]. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored blobs, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn names(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| StorageError::Lock("blob store mutex poisoned".to_string()))
    }
}

impl AtomicBlobStore for MemoryBlobStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        self.lock()?.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}
