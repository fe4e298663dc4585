//! Persistent backends for `keyvault-core`.
//!
//! [`BlobStorage`] implements the core [`keyvault_core::Storage`] trait on top
//! of any [`AtomicBlobStore`]: [`FsBlobStore`] for a directory on disk, or
//! [`MemoryBlobStore`] for tests. [`PasswordEncryptor`] seals the seed with a
//! password-derived key.
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyvault_core::{KeyVault, PortfolioOptions};
//! use keyvault_store::{BlobStorage, FsBlobStore, PasswordEncryptor};
//! use secrecy::SecretString;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FsBlobStore::new("/var/lib/keyvault")?);
//! let options = PortfolioOptions::new()
//!     .with_storage(Arc::new(BlobStorage::new(store)))
//!     .with_encryptor(Arc::new(PasswordEncryptor::new()))
//!     .with_password(SecretString::from("correct horse battery staple".to_string()));
//! let vault = KeyVault::open(options)?;
//! # drop(vault);
//! # Ok(())
//! # }
//! ```

mod blob_storage;
mod blob_store;
mod encryptor;
mod fs;
mod memory;

pub use blob_storage::BlobStorage;
pub use blob_store::AtomicBlobStore;
pub use encryptor::{KdfParams, PasswordEncryptor};
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
