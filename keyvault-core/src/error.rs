//! Errors returned by vault, wallet and account operations.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for key vault operations.
pub type KeyVaultResult<T> = Result<T, KeyVaultError>;

/// Error outputs from `KeyVault`
#[derive(Debug, Error)]
pub enum KeyVaultError {
    /// The seed or derivation path was rejected by the derivation primitive
    #[error("derivation_error: {0}")]
    Derivation(String),
    /// Persistence failure surfaced by the storage port
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The requested vault, wallet or account does not exist
    #[error("not_found: {0}")]
    NotFound(String),
    /// A wallet or account with the same name already exists
    #[error("already_exists: {0}")]
    AlreadyExists(String),
    /// The portfolio options are incomplete or inconsistent
    #[error("configuration_error: {0}")]
    Configuration(String),
    /// The process-wide BLS self-test failed
    #[error("crypto_init_error: {0}")]
    CryptoInit(String),
    /// The operation is not allowed on the target
    #[error("invalid_operation: {0}")]
    InvalidOperation(String),
}
