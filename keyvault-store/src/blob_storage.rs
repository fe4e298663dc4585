//! [`Storage`] over an [`AtomicBlobStore`].
//!
//! Every record lives in its own CBOR blob. The seed blob is an envelope that
//! says whether its payload was sealed by the configured [`Encryptor`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use keyvault_core::records::{AccountRecord, PortfolioRecord, WalletRecord};
use keyvault_core::{Encryptor, Seed, Storage, StorageError, StorageResult};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::blob_store::AtomicBlobStore;

const SEED_BLOB: &str = "seed.cbor";
const PORTFOLIO_BLOB: &str = "portfolio.cbor";
const SEED_ENVELOPE_VERSION: u32 = 1;

fn wallet_blob(id: Uuid) -> String {
    format!("wallet-{id}.cbor")
}

fn account_blob(id: Uuid) -> String {
    format!("account-{id}.cbor")
}

#[derive(Serialize, Deserialize)]
struct SeedEnvelope {
    version: u32,
    encrypted: bool,
    payload: Vec<u8>,
}

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    ciborium::de::from_reader(bytes).map_err(|err| StorageError::Serialization(err.to_string()))
}

type Encryption = (Arc<dyn Encryptor>, SecretString);

/// Persists a portfolio as CBOR blobs.
pub struct BlobStorage {
    store: Arc<dyn AtomicBlobStore>,
    encryption: Mutex<Option<Encryption>>,
    writes: Mutex<()>,
}

impl BlobStorage {
    /// Wraps a blob store.
    #[must_use]
    pub fn new(store: Arc<dyn AtomicBlobStore>) -> Self {
        Self {
            store,
            encryption: Mutex::new(None),
            writes: Mutex::new(()),
        }
    }

    /// Whether the stored seed (if any) is sealed by an encryptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed blob cannot be read or decoded.
    pub fn is_seed_encrypted(&self) -> StorageResult<bool> {
        Ok(self.read_seed_envelope()?.is_some_and(|envelope| envelope.encrypted))
    }

    fn encryption(&self) -> StorageResult<MutexGuard<'_, Option<Encryption>>> {
        self.encryption
            .lock()
            .map_err(|_| StorageError::Lock("encryption mutex poisoned".to_string()))
    }

    fn read_seed_envelope(&self) -> StorageResult<Option<SeedEnvelope>> {
        let Some(bytes) = self.store.read(SEED_BLOB)? else {
            return Ok(None);
        };
        let envelope: SeedEnvelope = decode(&bytes)?;
        if envelope.version != SEED_ENVELOPE_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }
        Ok(Some(envelope))
    }

    fn read_record<T: DeserializeOwned>(&self, name: &str) -> StorageResult<Option<T>> {
        self.store
            .read(name)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn write_blob(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        let _guard = self
            .writes
            .lock()
            .map_err(|_| StorageError::Lock("write mutex poisoned".to_string()))?;
        self.store.write_atomic(name, bytes)
    }
}

impl Storage for BlobStorage {
    fn set_encryptor(&self, encryptor: Arc<dyn Encryptor>, password: SecretString) {
        match self.encryption.lock() {
            Ok(mut guard) => *guard = Some((encryptor, password)),
            Err(poisoned) => *poisoned.into_inner() = Some((encryptor, password)),
        }
    }

    fn securely_save_seed(&self, seed: &Seed) -> StorageResult<()> {
        let envelope = match self.encryption()?.as_ref() {
            Some((encryptor, password)) => SeedEnvelope {
                version: SEED_ENVELOPE_VERSION,
                encrypted: true,
                payload: encryptor.encrypt(password, seed.expose_secret())?,
            },
            None => {
                log::warn!("storing portfolio seed without an encryptor");
                SeedEnvelope {
                    version: SEED_ENVELOPE_VERSION,
                    encrypted: false,
                    payload: seed.expose_secret().to_vec(),
                }
            }
        };
        let bytes = Zeroizing::new(encode(&envelope)?);
        drop(Zeroizing::new(envelope.payload));
        self.write_blob(SEED_BLOB, &bytes)
    }

    fn securely_fetch_seed(&self) -> StorageResult<Option<Seed>> {
        let Some(envelope) = self.read_seed_envelope()? else {
            return Ok(None);
        };
        let payload = Zeroizing::new(envelope.payload);
        if !envelope.encrypted {
            return Ok(Some(Seed::new(payload.to_vec())));
        }

        let encryption = self.encryption()?;
        let (encryptor, password) = encryption.as_ref().ok_or(StorageError::EncryptorRequired)?;
        Ok(Some(Seed::new(encryptor.decrypt(password, &payload)?)))
    }

    fn save_portfolio(&self, portfolio: &PortfolioRecord) -> StorageResult<()> {
        self.write_blob(PORTFOLIO_BLOB, &encode(portfolio)?)
    }

    fn open_portfolio(&self) -> StorageResult<Option<PortfolioRecord>> {
        self.read_record(PORTFOLIO_BLOB)
    }

    fn save_wallet(&self, wallet: &WalletRecord) -> StorageResult<()> {
        self.write_blob(&wallet_blob(wallet.id), &encode(wallet)?)
    }

    fn open_wallet(&self, id: Uuid) -> StorageResult<Option<WalletRecord>> {
        self.read_record(&wallet_blob(id))
    }

    fn save_account(&self, account: &AccountRecord) -> StorageResult<()> {
        self.write_blob(&account_blob(account.id), &encode(account)?)
    }

    fn open_account(&self, id: Uuid) -> StorageResult<Option<AccountRecord>> {
        self.read_record(&account_blob(id))
    }

    fn delete_account(&self, id: Uuid) -> StorageResult<()> {
        let _guard = self
            .writes
            .lock()
            .map_err(|_| StorageError::Lock("write mutex poisoned".to_string()))?;
        self.store.delete(&account_blob(id))
    }
}

impl fmt::Debug for BlobStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStorage").finish_non_exhaustive()
    }
}
