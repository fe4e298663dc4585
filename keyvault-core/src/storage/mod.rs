//! Storage port: the persistence capabilities the vault consumes.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStorage;
pub use traits::{Encryptor, Storage};
