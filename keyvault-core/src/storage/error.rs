//! Error types for storage port implementations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Errors coming from the blob store.
    #[error("blob store error: {0}")]
    BlobStore(String),

    /// File-system failures.
    #[error("io error: {context}: {source}")]
    Io {
        /// Context describing the operation.
        context: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Cryptographic failures (AEAD, key stretching, etc.).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Invalid or malformed encrypted envelope.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Unsupported record or envelope version.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// An internal lock was poisoned.
    #[error("storage lock error: {0}")]
    Lock(String),

    /// The stored seed is encrypted but no encryptor was configured.
    #[error("seed is encrypted but no encryptor is configured")]
    EncryptorRequired,

    /// Failure injected by a test double.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl StorageError {
    /// Builds an [`StorageError::Io`] with the given context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
