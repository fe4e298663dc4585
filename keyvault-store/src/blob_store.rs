//! Atomic blob store trait.

use keyvault_core::StorageResult;

/// Named byte blobs with atomic replacement.
///
/// Writes must never leave a partially written blob behind: a reader sees
/// either the complete old content or the complete new content. File-backed
/// implementations get this by writing to a temporary file, syncing it and
/// renaming it over the target.
///
/// Blobs used by [`crate::BlobStorage`]:
/// - `seed.cbor`: the seed envelope
/// - `portfolio.cbor`: the portfolio snapshot
/// - `wallet-<id>.cbor`, `account-<id>.cbor`: wallet and account records
pub trait AtomicBlobStore: Send + Sync {
    /// Reads a blob by name, `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically writes a blob, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Deletes a blob. Missing blobs are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for actual backend failures.
    fn delete(&self, name: &str) -> StorageResult<()>;

    /// Checks if a blob exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.read(name)?.is_some())
    }
}
