//! Directory-backed [`AtomicBlobStore`].
//!
//! Writes go to `.<name>.tmp`, are synced, renamed over the target, and the
//! directory is synced so the rename itself is durable.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use keyvault_core::{StorageError, StorageResult};

use crate::blob_store::AtomicBlobStore;

/// Stores each blob as a file in one directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    directory: PathBuf,
}

impl FsBlobStore {
    /// Opens (creating if needed) a blob store rooted at `directory`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(directory: P) -> StorageResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|err| {
            StorageError::io(
                format!("failed to create blob directory '{}'", directory.display()),
                err,
            )
        })?;
        Ok(Self { directory })
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn blob_path(&self, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StorageError::BlobStore(format!("invalid blob name '{name}'")));
        }
        Ok(self.directory.join(name))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!(".{name}.tmp"))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.directory)
            .and_then(|dir| dir.sync_all())
            .map_err(|err| StorageError::io("failed to sync blob directory", err))
    }

    #[cfg(not(unix))]
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

impl AtomicBlobStore for FsBlobStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.blob_path(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(
                format!("failed to read blob '{}'", path.display()),
                err,
            )),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        let final_path = self.blob_path(name)?;
        let temp_path = self.temp_path(name);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|err| {
                StorageError::io(
                    format!("failed to create temporary file '{}'", temp_path.display()),
                    err,
                )
            })?;
        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|err| {
                StorageError::io(
                    format!("failed to write temporary file '{}'", temp_path.display()),
                    err,
                )
            })?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::io(
                format!("failed to move blob into place '{}'", final_path.display()),
                err,
            ));
        }
        self.sync_directory()?;
        log::trace!("wrote blob {name} ({} bytes)", bytes.len());
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.blob_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io(
                format!("failed to delete blob '{}'", path.display()),
                err,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().join("blobs")).expect("store");

        assert_eq!(store.read("a.cbor").expect("read"), None);
        store.write_atomic("a.cbor", b"first").expect("write");
        store.write_atomic("a.cbor", b"second").expect("overwrite");
        assert_eq!(store.read("a.cbor").expect("read"), Some(b"second".to_vec()));
        assert!(store.exists("a.cbor").expect("exists"));
        assert!(!store.directory().join(".a.cbor.tmp").exists());

        store.delete("a.cbor").expect("delete");
        store.delete("a.cbor").expect("delete missing");
        assert!(!store.exists("a.cbor").expect("exists"));
    }

    #[test]
    fn test_rejects_names_outside_the_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path()).expect("store");

        for name in ["", "../escape", "nested/blob", ".hidden"] {
            match store.write_atomic(name, b"x") {
                Err(StorageError::BlobStore(_)) => {}
                other => panic!("unexpected result for '{name}': {other:?}"),
            }
        }
    }
}
