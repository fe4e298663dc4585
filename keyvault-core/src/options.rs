//! Builder for the inputs of [`crate::KeyVault`] constructors.
//!
//! Storage is required. An encryptor and a password must be given together.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;

use crate::crypto::MIN_SEED_LEN;
use crate::error::{KeyVaultError, KeyVaultResult};
use crate::seed::Seed;
use crate::storage::{Encryptor, Storage};

/// Inputs for creating, importing or opening a [`crate::KeyVault`].
///
/// ```
/// use std::sync::Arc;
/// use keyvault_core::{storage::InMemoryStorage, PortfolioOptions};
///
/// let options = PortfolioOptions::new().with_storage(Arc::new(InMemoryStorage::new()));
/// ```
#[derive(Default)]
pub struct PortfolioOptions {
    storage: Option<Arc<dyn Storage>>,
    encryptor: Option<Arc<dyn Encryptor>>,
    password: Option<SecretString>,
    seed: Option<Seed>,
}

impl PortfolioOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage backend. Required.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the at-rest encryptor for the seed. Requires a password.
    #[must_use]
    pub fn with_encryptor(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Sets the password handed to the encryptor.
    #[must_use]
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Sets the seed to import.
    #[must_use]
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the options and configures encryption on the storage.
    pub(crate) fn setup_storage(&mut self) -> KeyVaultResult<Arc<dyn Storage>> {
        let storage = self
            .storage
            .clone()
            .ok_or_else(|| KeyVaultError::Configuration("storage is required".to_string()))?;

        match (self.encryptor.take(), self.password.take()) {
            (Some(encryptor), Some(password)) => storage.set_encryptor(encryptor, password),
            (None, None) => {}
            (Some(_), None) => {
                return Err(KeyVaultError::Configuration(
                    "an encryptor requires a password".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(KeyVaultError::Configuration(
                    "a password requires an encryptor".to_string(),
                ))
            }
        }
        Ok(storage)
    }

    /// Takes the seed to import, checking its size.
    pub(crate) fn take_seed(&mut self) -> KeyVaultResult<Seed> {
        let seed = self
            .seed
            .take()
            .ok_or_else(|| KeyVaultError::Configuration("a seed is required".to_string()))?;
        if seed.len() < MIN_SEED_LEN {
            return Err(KeyVaultError::Configuration(format!(
                "seed must be at least {MIN_SEED_LEN} bytes, got {}",
                seed.len()
            )));
        }
        Ok(seed)
    }
}

impl fmt::Debug for PortfolioOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortfolioOptions")
            .field("storage", &self.storage.is_some())
            .field("encryptor", &self.encryptor.is_some())
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("seed", &self.seed)
            .finish()
    }
}
