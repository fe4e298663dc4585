//! Capabilities the core consumes from a storage backend.

use std::sync::Arc;

use secrecy::SecretString;
use uuid::Uuid;

use super::error::StorageResult;
use crate::records::{AccountRecord, PortfolioRecord, WalletRecord};
use crate::seed::Seed;

/// Password-based at-rest encryption used by storage backends for the seed.
pub trait Encryptor: Send + Sync {
    /// Encrypts `plaintext` under a key stretched from `password`.
    ///
    /// # Errors
    ///
    /// Returns an error if key stretching or encryption fails.
    fn encrypt(&self, password: &SecretString, plaintext: &[u8]) -> StorageResult<Vec<u8>>;

    /// Decrypts `ciphertext` produced by [`Encryptor::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns an error if the password is wrong or the ciphertext was tampered with.
    fn decrypt(&self, password: &SecretString, ciphertext: &[u8]) -> StorageResult<Vec<u8>>;
}

/// Durable persistence for a portfolio.
///
/// A single handle is shared by the vault and every wallet and account derived
/// from it. Implementations must serialize conflicting writes themselves; the
/// core performs no locking around these calls.
pub trait Storage: Send + Sync {
    /// Configures at-rest encryption. Must be called before any seed is saved or fetched.
    fn set_encryptor(&self, encryptor: Arc<dyn Encryptor>, password: SecretString);

    /// Persists the portfolio seed under at-rest protection.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the write fails.
    fn securely_save_seed(&self, seed: &Seed) -> StorageResult<()>;

    /// Returns the previously saved seed, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decryption fails.
    fn securely_fetch_seed(&self) -> StorageResult<Option<Seed>>;

    /// Persists (or overwrites) the portfolio snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_portfolio(&self, portfolio: &PortfolioRecord) -> StorageResult<()>;

    /// Returns the portfolio snapshot, or `None` if no portfolio was ever saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn open_portfolio(&self) -> StorageResult<Option<PortfolioRecord>>;

    /// Persists (or overwrites) a wallet record keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_wallet(&self, wallet: &WalletRecord) -> StorageResult<()>;

    /// Returns the wallet record with `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn open_wallet(&self, id: Uuid) -> StorageResult<Option<WalletRecord>>;

    /// Persists (or overwrites) an account record keyed by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_account(&self, account: &AccountRecord) -> StorageResult<()>;

    /// Returns the account record with `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn open_account(&self, id: Uuid) -> StorageResult<Option<AccountRecord>>;

    /// Deletes the account record with `id`. Missing records are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for actual backend failures.
    fn delete_account(&self, id: Uuid) -> StorageResult<()>;
}
