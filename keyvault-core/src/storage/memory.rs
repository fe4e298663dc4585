//! In-memory [`Storage`] implementation.
//!
//! Nothing survives the process. Useful for tests and for embedding a vault
//! whose records are mirrored elsewhere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use secrecy::SecretString;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::error::{StorageError, StorageResult};
use super::traits::{Encryptor, Storage};
use crate::records::{AccountRecord, PortfolioRecord, WalletRecord};
use crate::seed::Seed;

enum StoredSeed {
    Plain(Zeroizing<Vec<u8>>),
    Encrypted(Vec<u8>),
}

#[derive(Default)]
struct State {
    seed: Option<StoredSeed>,
    portfolio: Option<PortfolioRecord>,
    wallets: HashMap<Uuid, WalletRecord>,
    accounts: HashMap<Uuid, AccountRecord>,
}

type Encryption = (Arc<dyn Encryptor>, SecretString);

/// In-memory storage backed by hash maps behind a mutex.
#[derive(Default)]
pub struct InMemoryStorage {
    state: Mutex<State>,
    encryption: Mutex<Option<Encryption>>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of account records currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn account_record_count(&self) -> StorageResult<usize> {
        Ok(self.state()?.accounts.len())
    }

    /// Whether the stored seed (if any) is encrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn is_seed_encrypted(&self) -> StorageResult<bool> {
        Ok(matches!(self.state()?.seed, Some(StoredSeed::Encrypted(_))))
    }

    fn state(&self) -> StorageResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))
    }

    fn encryption(&self) -> StorageResult<MutexGuard<'_, Option<Encryption>>> {
        self.encryption
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))
    }
}

impl Storage for InMemoryStorage {
    fn set_encryptor(&self, encryptor: Arc<dyn Encryptor>, password: SecretString) {
        match self.encryption.lock() {
            Ok(mut guard) => *guard = Some((encryptor, password)),
            Err(poisoned) => *poisoned.into_inner() = Some((encryptor, password)),
        }
    }

    fn securely_save_seed(&self, seed: &Seed) -> StorageResult<()> {
        let stored = match self.encryption()?.as_ref() {
            Some((encryptor, password)) => {
                StoredSeed::Encrypted(encryptor.encrypt(password, seed.expose_secret())?)
            }
            None => {
                log::warn!("storing portfolio seed without an encryptor");
                StoredSeed::Plain(Zeroizing::new(seed.expose_secret().to_vec()))
            }
        };
        self.state()?.seed = Some(stored);
        Ok(())
    }

    fn securely_fetch_seed(&self) -> StorageResult<Option<Seed>> {
        let state = self.state()?;
        match &state.seed {
            None => Ok(None),
            Some(StoredSeed::Plain(bytes)) => Ok(Some(Seed::new(bytes.to_vec()))),
            Some(StoredSeed::Encrypted(ciphertext)) => {
                let encryption = self.encryption()?;
                let (encryptor, password) =
                    encryption.as_ref().ok_or(StorageError::EncryptorRequired)?;
                let plaintext = encryptor.decrypt(password, ciphertext)?;
                Ok(Some(Seed::new(plaintext)))
            }
        }
    }

    fn save_portfolio(&self, portfolio: &PortfolioRecord) -> StorageResult<()> {
        self.state()?.portfolio = Some(portfolio.clone());
        Ok(())
    }

    fn open_portfolio(&self) -> StorageResult<Option<PortfolioRecord>> {
        Ok(self.state()?.portfolio.clone())
    }

    fn save_wallet(&self, wallet: &WalletRecord) -> StorageResult<()> {
        self.state()?.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    fn open_wallet(&self, id: Uuid) -> StorageResult<Option<WalletRecord>> {
        Ok(self.state()?.wallets.get(&id).cloned())
    }

    fn save_account(&self, account: &AccountRecord) -> StorageResult<()> {
        self.state()?.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn open_account(&self, id: Uuid) -> StorageResult<Option<AccountRecord>> {
        Ok(self.state()?.accounts.get(&id).cloned())
    }

    fn delete_account(&self, id: Uuid) -> StorageResult<()> {
        self.state()?.accounts.remove(&id);
        Ok(())
    }
}
