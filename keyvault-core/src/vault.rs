//! The portfolio root: seed custody, the root key node and the wallet index.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::context::PortfolioContext;
use crate::crypto;
use crate::error::{KeyVaultError, KeyVaultResult};
use crate::key_node::{KeyNode, BASE_EIP2334_PATH};
use crate::options::PortfolioOptions;
use crate::records::{PortfolioRecord, RECORD_VERSION};
use crate::seed::Seed;
use crate::storage::{Storage, StorageError};
use crate::wallet::HdWallet;

/// A portfolio of HD wallets derived from one seed.
///
/// ```no_run
/// use std::sync::Arc;
/// use keyvault_core::{storage::InMemoryStorage, KeyVault, PortfolioOptions};
///
/// # fn main() -> Result<(), keyvault_core::KeyVaultError> {
/// let storage = Arc::new(InMemoryStorage::new());
/// let mut vault = KeyVault::create(PortfolioOptions::new().with_storage(storage))?;
/// let mut wallet = vault.create_wallet("staking")?;
/// let validator = wallet.create_validator_account("validator-0")?;
/// println!("{}", validator.public_key());
/// # Ok(())
/// # }
/// ```
pub struct KeyVault {
    id: Uuid,
    wallets: BTreeMap<String, Uuid>,
    next_wallet_index: u32,
    context: Arc<PortfolioContext>,
    key: KeyNode,
}

impl KeyVault {
    /// Creates a new portfolio.
    ///
    /// A seed left in storage without a portfolio snapshot (an interrupted
    /// setup) is reused; otherwise a random one is generated and saved.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::AlreadyExists`] if the storage already holds a
    /// portfolio. Also fails on crypto initialization, invalid options,
    /// storage failures, or a stored seed that cannot be used for derivation.
    pub fn create(mut options: PortfolioOptions) -> KeyVaultResult<Self> {
        crypto::init()?;
        let storage = options.setup_storage()?;
        ensure_vacant(storage.as_ref())?;

        let (seed, fresh) = match storage.securely_fetch_seed()? {
            Some(seed) => {
                log::info!("reusing the seed already present in storage");
                (seed, false)
            }
            None => (Seed::generate(), true),
        };
        let key = KeyNode::base_from_seed(seed)?;
        if fresh {
            storage.securely_save_seed(key.seed())?;
        }
        Self::complete_setup(storage, key)
    }

    /// Creates a new portfolio from the seed given in `options`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Configuration`] if no seed (or a seed shorter
    /// than 32 bytes) was given, plus the failures of [`KeyVault::create`].
    pub fn import(mut options: PortfolioOptions) -> KeyVaultResult<Self> {
        crypto::init()?;
        let storage = options.setup_storage()?;
        ensure_vacant(storage.as_ref())?;
        let seed = options.take_seed()?;

        let key = KeyNode::base_from_seed(seed)?;
        storage.securely_save_seed(key.seed())?;
        Self::complete_setup(storage, key)
    }

    /// Reopens the portfolio persisted in the storage given in `options`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::NotFound`] if no snapshot or no seed exists,
    /// or the storage or derivation error.
    pub fn open(mut options: PortfolioOptions) -> KeyVaultResult<Self> {
        crypto::init()?;
        let storage = options.setup_storage()?;

        let record = storage
            .open_portfolio()?
            .ok_or_else(|| KeyVaultError::NotFound("portfolio".to_string()))?;
        if record.version != RECORD_VERSION {
            return Err(StorageError::UnsupportedVersion(record.version).into());
        }
        let seed = storage
            .securely_fetch_seed()?
            .ok_or_else(|| KeyVaultError::NotFound("portfolio seed".to_string()))?;
        let key = KeyNode::from_seed_and_path(Arc::new(seed), &record.base_path)?;

        log::info!(
            "opened portfolio {} with {} wallet(s)",
            record.id,
            record.wallets.len()
        );
        Ok(Self {
            id: record.id,
            wallets: record.wallets,
            next_wallet_index: record.next_wallet_index,
            context: PortfolioContext::new(storage, record.id),
            key,
        })
    }

    fn complete_setup(storage: Arc<dyn Storage>, key: KeyNode) -> KeyVaultResult<Self> {
        let id = Uuid::new_v4();
        let vault = Self {
            id,
            wallets: BTreeMap::new(),
            next_wallet_index: 0,
            context: PortfolioContext::new(storage, id),
            key,
        };
        vault.context.storage().save_portfolio(&vault.to_record())?;

        log::info!("created portfolio {id} at {}", vault.key.path());
        Ok(vault)
    }

    /// Portfolio id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Number of wallets in the portfolio.
    #[must_use]
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// The shared context handed to wallets and accounts.
    #[must_use]
    pub const fn context(&self) -> &Arc<PortfolioContext> {
        &self.context
    }

    /// The root node (`m/12381/3600`).
    #[must_use]
    pub const fn root_key(&self) -> &KeyNode {
        &self.key
    }

    /// Creates a wallet at the next wallet index.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::AlreadyExists`] for a taken name, or the
    /// error that aborted wallet construction or the snapshot write. A failed
    /// snapshot write leaves the portfolio index unchanged.
    pub fn create_wallet(&mut self, name: &str) -> KeyVaultResult<HdWallet> {
        if self.wallets.contains_key(name) {
            return Err(KeyVaultError::AlreadyExists(format!("wallet '{name}'")));
        }
        let index = self.next_wallet_index;
        let next = index.checked_add(1).ok_or_else(|| {
            KeyVaultError::InvalidOperation("wallet index space exhausted".to_string())
        })?;

        let wallet = HdWallet::create(
            name,
            &self.key,
            &index.to_string(),
            Arc::clone(&self.context),
        )?;

        self.wallets.insert(name.to_string(), wallet.id());
        self.next_wallet_index = next;
        if let Err(err) = self.context.storage().save_portfolio(&self.to_record()) {
            self.wallets.remove(name);
            self.next_wallet_index = index;
            log::warn!("rolled back wallet '{name}' in portfolio {}: {err}", self.id);
            return Err(err.into());
        }
        Ok(wallet)
    }

    /// Loads a wallet by name.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::NotFound`] if the name is unknown or its record
    /// is missing.
    pub fn wallet_by_name(&self, name: &str) -> KeyVaultResult<HdWallet> {
        let id = self
            .wallets
            .get(name)
            .copied()
            .ok_or_else(|| KeyVaultError::NotFound(format!("wallet '{name}'")))?;
        self.wallet_by_id(id)
    }

    /// Loads a wallet by id.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::NotFound`] if storage has no such wallet or it
    /// belongs to another portfolio.
    pub fn wallet_by_id(&self, id: Uuid) -> KeyVaultResult<HdWallet> {
        let record = self
            .context
            .storage()
            .open_wallet(id)?
            .ok_or_else(|| KeyVaultError::NotFound(format!("wallet {id}")))?;
        HdWallet::from_record(record, &self.key, Arc::clone(&self.context))
    }

    /// Iterates over all wallets in name order, loading each on demand.
    pub fn wallets(&self) -> impl Iterator<Item = KeyVaultResult<HdWallet>> + '_ {
        self.wallets.values().map(move |id| self.wallet_by_id(*id))
    }

    /// The persisted snapshot of this portfolio.
    #[must_use]
    pub fn to_record(&self) -> PortfolioRecord {
        PortfolioRecord {
            version: RECORD_VERSION,
            id: self.id,
            base_path: BASE_EIP2334_PATH.to_string(),
            wallets: self.wallets.clone(),
            next_wallet_index: self.next_wallet_index,
        }
    }
}

/// Refuses to set up a portfolio over one that is already persisted.
fn ensure_vacant(storage: &dyn Storage) -> KeyVaultResult<()> {
    if let Some(existing) = storage.open_portfolio()? {
        log::warn!("storage already holds portfolio {}", existing.id);
        return Err(KeyVaultError::AlreadyExists(format!(
            "portfolio {}",
            existing.id
        )));
    }
    Ok(())
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("id", &self.id)
            .field("wallets", &self.wallets)
            .field("root", &self.key.path())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::storage::test_support::{FlakyStorage, XorEncryptor};
    use crate::storage::InMemoryStorage;

    fn options(storage: &Arc<InMemoryStorage>) -> PortfolioOptions {
        PortfolioOptions::new().with_storage(storage.clone())
    }

    #[test]
    fn test_create_persists_seed_and_snapshot() {
        let storage = Arc::new(InMemoryStorage::new());
        let vault = KeyVault::create(options(&storage)).expect("create");

        assert_eq!(vault.root_key().path(), BASE_EIP2334_PATH);
        assert_eq!(vault.wallet_count(), 0);
        assert_eq!(vault.context().portfolio_id(), vault.id());
        assert!(storage.securely_fetch_seed().expect("fetch").is_some());
        assert_eq!(
            storage.open_portfolio().expect("open"),
            Some(vault.to_record())
        );
        assert_eq!(crypto::init_runs(), 1);
    }

    #[test]
    fn test_create_reuses_seed_left_without_snapshot() {
        let storage = Arc::new(InMemoryStorage::new());
        let seed = Seed::from([7u8; 32]);
        storage.securely_save_seed(&seed).expect("save seed");

        let vault = KeyVault::create(options(&storage)).expect("create");
        let expected = KeyNode::base_from_seed(Seed::from([7u8; 32])).expect("base");
        assert_eq!(vault.root_key().public_key(), expected.public_key());
        assert_eq!(
            storage.open_portfolio().expect("open"),
            Some(vault.to_record())
        );
    }

    #[test]
    fn test_create_refuses_to_replace_an_existing_portfolio() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut first = KeyVault::create(options(&storage)).expect("first");
        let savings = first.create_wallet("savings").expect("wallet");
        let snapshot = storage.open_portfolio().expect("open");

        let err = KeyVault::create(options(&storage)).unwrap_err();
        match err {
            KeyVaultError::AlreadyExists(_) => {}
            _ => panic!("unexpected error: {err}"),
        }
        let err = KeyVault::import(options(&storage).with_seed(Seed::from([1u8; 32])))
            .unwrap_err();
        match err {
            KeyVaultError::AlreadyExists(_) => {}
            _ => panic!("unexpected error: {err}"),
        }
        assert_eq!(storage.open_portfolio().expect("open"), snapshot);

        let reopened = KeyVault::open(options(&storage)).expect("reopen");
        assert_eq!(reopened.id(), first.id());
        let wallet = reopened.wallet_by_name("savings").expect("savings");
        assert_eq!(wallet.id(), savings.id());
        assert_eq!(
            wallet.withdrawal_account().expect("withdrawal").public_key(),
            savings.withdrawal_account().expect("withdrawal").public_key()
        );
    }

    #[test]
    fn test_import_zero_seed_is_deterministic() {
        let import = || {
            let storage = Arc::new(InMemoryStorage::new());
            KeyVault::import(options(&storage).with_seed(Seed::from([0u8; 32]))).expect("import")
        };
        let first = import();
        let second = import();

        let key = first.root_key().public_key();
        assert_eq!(key.as_bytes().len(), 48);
        assert_eq!(key, second.root_key().public_key());
        assert_eq!(
            first.root_key().derive("0/0/0").expect("child").public_key(),
            second.root_key().derive("0/0/0").expect("child").public_key()
        );
    }

    #[test]
    fn test_import_requires_a_seed() {
        let storage = Arc::new(InMemoryStorage::new());
        match KeyVault::import(options(&storage)) {
            Err(KeyVaultError::Configuration(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(storage.securely_fetch_seed().expect("fetch").is_none());
    }

    #[test]
    fn test_open_without_snapshot_is_not_found() {
        let storage = Arc::new(InMemoryStorage::new());
        match KeyVault::open(options(&storage)) {
            Err(KeyVaultError::NotFound(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_open_without_seed_is_not_found() {
        let storage = Arc::new(InMemoryStorage::new());
        let vault = KeyVault::create(options(&storage)).expect("create");

        let empty = Arc::new(InMemoryStorage::new());
        empty.save_portfolio(&vault.to_record()).expect("save");
        match KeyVault::open(options(&empty)) {
            Err(KeyVaultError::NotFound(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_open_rejects_unknown_record_version() {
        let storage = Arc::new(InMemoryStorage::new());
        let vault = KeyVault::create(options(&storage)).expect("create");
        let mut record = vault.to_record();
        record.version = RECORD_VERSION + 1;
        storage.save_portfolio(&record).expect("save");

        match KeyVault::open(options(&storage)) {
            Err(KeyVaultError::Storage(StorageError::UnsupportedVersion(_))) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_reopen_reproduces_wallets_and_accounts() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut vault = KeyVault::create(options(&storage)).expect("create");
        let mut staking = vault.create_wallet("staking").expect("staking");
        let validator = staking.create_validator_account("v0").expect("v0");
        vault.create_wallet("cold").expect("cold");

        let reopened = KeyVault::open(options(&storage)).expect("open");
        assert_eq!(reopened.id(), vault.id());
        assert_eq!(reopened.to_record(), vault.to_record());

        let staking = reopened.wallet_by_name("staking").expect("staking");
        assert_eq!(staking.path(), "0");
        assert_eq!(staking.account_count(), 2);
        let restored = staking.account_by_name("v0").expect("v0");
        assert_eq!(restored.public_key(), validator.public_key());
        assert_eq!(restored.path(), "m/12381/3600/0/0/0");

        let names: Vec<String> = reopened
            .wallets()
            .map(|wallet| wallet.expect("wallet").name().to_string())
            .collect();
        assert_eq!(names, vec!["cold".to_string(), "staking".to_string()]);
    }

    #[test]
    fn test_wallets_get_increasing_indices() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut vault = KeyVault::create(options(&storage)).expect("create");
        let first = vault.create_wallet("a").expect("a");
        let second = vault.create_wallet("b").expect("b");

        assert_eq!(first.key().path(), "m/12381/3600/0");
        assert_eq!(second.key().path(), "m/12381/3600/1");
        assert_eq!(
            vault.wallet_by_id(second.id()).expect("by id").name(),
            "b"
        );
    }

    #[test]
    fn test_duplicate_wallet_name_rejected() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut vault = KeyVault::create(options(&storage)).expect("create");
        vault.create_wallet("a").expect("a");

        let err = vault.create_wallet("a").unwrap_err();
        match err {
            KeyVaultError::AlreadyExists(_) => {}
            _ => panic!("unexpected error: {err}"),
        }
        match vault.wallet_by_name("missing") {
            Err(KeyVaultError::NotFound(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_failure_rolls_back_wallet_index() {
        let storage = FlakyStorage::new();
        let mut vault =
            KeyVault::create(PortfolioOptions::new().with_storage(storage.clone())).expect("create");
        let before = vault.to_record();

        storage.fail_save_portfolio(true);
        let err = vault.create_wallet("a").unwrap_err();
        match err {
            KeyVaultError::Storage(StorageError::Injected(_)) => {}
            _ => panic!("unexpected error: {err}"),
        }
        assert_eq!(vault.to_record(), before);

        storage.fail_save_portfolio(false);
        let wallet = vault.create_wallet("a").expect("retry");
        assert_eq!(wallet.path(), "0");
    }

    #[test]
    fn test_encrypted_seed_survives_reopen() {
        let storage = Arc::new(InMemoryStorage::new());
        let encrypted = |storage: &Arc<InMemoryStorage>| {
            options(storage)
                .with_encryptor(Arc::new(XorEncryptor))
                .with_password(SecretString::from("hunter2".to_string()))
        };
        let vault = KeyVault::create(encrypted(&storage)).expect("create");
        assert!(storage.is_seed_encrypted().expect("state"));

        let reopened = KeyVault::open(encrypted(&storage)).expect("open");
        assert_eq!(reopened.root_key().public_key(), vault.root_key().public_key());
    }
}
