//! EIP-2334 hierarchical deterministic wallets.
//!
//! A wallet lives at `m/12381/3600/<i>` and owns:
//!
//! - one withdrawal account at `<wallet>/0`, created together with the wallet;
//! - validator accounts at `<wallet>/0/<n>`, where `n` comes from a persisted
//!   counter that only moves forward.
//!
//! Every account creation updates the in-memory index first, then writes the
//! account record and the wallet record. If either write fails the in-memory
//! changes are undone before the error is returned, so the index never lists
//! an account that was not persisted.

mod index;

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use self::index::AccountIndex;
use crate::account::Account;
use crate::context::PortfolioContext;
use crate::error::{KeyVaultError, KeyVaultResult};
use crate::key_node::KeyNode;
use crate::records::{
    AccountEntry, AccountKind, AccountRecord, WalletKind, WalletRecord, RECORD_VERSION,
};
use crate::storage::StorageError;

/// Path of the withdrawal key relative to the wallet node.
pub const WITHDRAWAL_KEY_PATH: &str = "0";

/// Reserved name of the withdrawal account.
pub const WITHDRAWAL_KEY_NAME: &str = "wallet_withdrawal_key_unique";

/// Path of validator key `index` relative to the wallet node.
#[must_use]
pub fn validator_key_path(index: u32) -> String {
    format!("{WITHDRAWAL_KEY_PATH}/{index}")
}

/// A named collection of accounts rooted at one key node.
pub struct HdWallet {
    id: Uuid,
    name: String,
    kind: WalletKind,
    path: String,
    key: KeyNode,
    account_ids: Vec<Uuid>,
    index: AccountIndex,
    next_validator_index: u32,
    context: Arc<PortfolioContext>,
}

impl HdWallet {
    /// Creates a wallet at `path` below `root` and its withdrawal account.
    ///
    /// The wallet record is persisted as part of the withdrawal account
    /// registration.
    ///
    /// # Errors
    ///
    /// Fails if derivation fails or if persisting the withdrawal account or the
    /// wallet record fails. Writes already issued are not undone.
    pub fn create(
        name: &str,
        root: &KeyNode,
        path: &str,
        context: Arc<PortfolioContext>,
    ) -> KeyVaultResult<Self> {
        let key = root.derive(path)?;
        let mut wallet = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: WalletKind::HierarchicalDeterministic,
            path: path.to_string(),
            key,
            account_ids: Vec::new(),
            index: AccountIndex::default(),
            next_validator_index: 0,
            context,
        };

        wallet.create_account(
            WITHDRAWAL_KEY_NAME,
            WITHDRAWAL_KEY_PATH.to_string(),
            AccountKind::Withdrawal,
            None,
        )?;

        log::info!(
            "created wallet '{}' ({}) at {}",
            wallet.name,
            wallet.id,
            wallet.key.path()
        );
        Ok(wallet)
    }

    /// Rehydrates a wallet from its record, re-deriving its node from `root`.
    pub(crate) fn from_record(
        record: WalletRecord,
        root: &KeyNode,
        context: Arc<PortfolioContext>,
    ) -> KeyVaultResult<Self> {
        if record.version != RECORD_VERSION {
            return Err(StorageError::UnsupportedVersion(record.version).into());
        }
        if record.portfolio_id != context.portfolio_id() {
            return Err(KeyVaultError::NotFound(format!(
                "wallet {} in portfolio {}",
                record.id,
                context.portfolio_id()
            )));
        }

        let mut index = AccountIndex::default();
        for entry in &record.accounts {
            if index.name(entry.id).is_some() || index.contains_name(&entry.name) {
                return Err(StorageError::Serialization(format!(
                    "wallet {} lists account '{}' ({}) more than once",
                    record.id, entry.name, entry.id
                ))
                .into());
            }
            index.insert(entry.id, &entry.name);
        }

        Ok(Self {
            id: record.id,
            key: root.derive(&record.path)?,
            name: record.name,
            kind: record.kind,
            path: record.path,
            account_ids: record.accounts.iter().map(|entry| entry.id).collect(),
            index,
            next_validator_index: record.next_validator_index,
            context,
        })
    }

    /// Wallet id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Wallet name, unique within its portfolio.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wallet kind.
    #[must_use]
    pub const fn kind(&self) -> WalletKind {
        self.kind
    }

    /// Path of the wallet node relative to the portfolio root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The wallet's key node.
    #[must_use]
    pub const fn key(&self) -> &KeyNode {
        &self.key
    }

    /// Ids of the owned accounts in creation order.
    #[must_use]
    pub fn account_ids(&self) -> &[Uuid] {
        &self.account_ids
    }

    /// Number of owned accounts, including the withdrawal account.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.account_ids.len()
    }

    /// Index the next validator account will be derived at.
    #[must_use]
    pub const fn next_validator_index(&self) -> u32 {
        self.next_validator_index
    }

    /// Returns the wallet's withdrawal account.
    ///
    /// # Errors
    ///
    /// Fails only if storage cannot load the account.
    pub fn withdrawal_account(&self) -> KeyVaultResult<Account> {
        self.account_by_name(WITHDRAWAL_KEY_NAME)
    }

    /// Creates a validator account at the next validator path.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::AlreadyExists`] if the name is taken, or the
    /// derivation or storage error that aborted the creation. On error the
    /// wallet is left exactly as it was before the call.
    pub fn create_validator_account(&mut self, name: &str) -> KeyVaultResult<Account> {
        let index = self.next_validator_index;
        let next = index.checked_add(1).ok_or_else(|| {
            KeyVaultError::InvalidOperation("validator index space exhausted".to_string())
        })?;
        self.create_account(name, validator_key_path(index), AccountKind::Validator, Some(next))
    }

    /// Loads an owned account by id.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::NotFound`] if storage has no such account or it
    /// belongs to another wallet.
    pub fn account_by_id(&self, id: Uuid) -> KeyVaultResult<Account> {
        let record = self
            .context
            .storage()
            .open_account(id)?
            .filter(|record| record.wallet_id == self.id)
            .ok_or_else(|| KeyVaultError::NotFound(format!("account {id}")))?;
        if record.version != RECORD_VERSION {
            return Err(StorageError::UnsupportedVersion(record.version).into());
        }
        let key = self.key.derive(&record.path)?;
        Ok(Account::from_record(record, key, Arc::clone(&self.context)))
    }

    /// Loads an owned account by name.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::NotFound`] if the name is not in the index.
    pub fn account_by_name(&self, name: &str) -> KeyVaultResult<Account> {
        let id = self
            .index
            .id(name)
            .ok_or_else(|| KeyVaultError::NotFound(format!("account '{name}'")))?;
        self.account_by_id(id)
    }

    /// Iterates over all owned accounts in creation order.
    ///
    /// Each item is loaded from storage when the iterator reaches it; calling
    /// `accounts()` again starts over.
    pub fn accounts(&self) -> impl Iterator<Item = KeyVaultResult<Account>> + '_ {
        self.account_ids.iter().map(move |id| self.account_by_id(*id))
    }

    /// Removes a validator account.
    ///
    /// The wallet record is rewritten first, then the account record is
    /// deleted. The validator counter is not rewound, so the removed path is
    /// never handed out again.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::NotFound`] for unknown ids,
    /// [`KeyVaultError::InvalidOperation`] for the withdrawal account, or the
    /// storage error. If the wallet record cannot be written the in-memory
    /// state is restored. Once it is written the removal stands: a failed
    /// delete of the account record is only logged.
    pub fn remove_account(&mut self, id: Uuid) -> KeyVaultResult<()> {
        let position = self
            .account_ids
            .iter()
            .position(|owned| *owned == id)
            .ok_or_else(|| KeyVaultError::NotFound(format!("account {id}")))?;
        if self.index.name(id) == Some(WITHDRAWAL_KEY_NAME) {
            return Err(KeyVaultError::InvalidOperation(
                "the withdrawal account cannot be removed".to_string(),
            ));
        }

        self.account_ids.remove(position);
        let name = self.index.remove(id).unwrap_or_default();

        if let Err(err) = self.context.storage().save_wallet(&self.to_record()) {
            self.account_ids.insert(position, id);
            self.index.insert(id, &name);
            log::warn!("rolled back removal of account '{name}' from wallet {}: {err}", self.id);
            return Err(err.into());
        }
        if let Err(err) = self.context.storage().delete_account(id) {
            log::warn!(
                "account record {id} left orphaned after removal from wallet {}: {err}",
                self.id
            );
        }

        log::info!("removed account '{name}' ({id}) from wallet {}", self.id);
        Ok(())
    }

    /// The persisted form of this wallet.
    #[must_use]
    pub fn to_record(&self) -> WalletRecord {
        WalletRecord {
            version: RECORD_VERSION,
            id: self.id,
            portfolio_id: self.context.portfolio_id(),
            name: self.name.clone(),
            kind: self.kind,
            path: self.path.clone(),
            accounts: self
                .account_ids
                .iter()
                .filter_map(|id| {
                    self.index.name(*id).map(|name| AccountEntry {
                        id: *id,
                        name: name.to_string(),
                    })
                })
                .collect(),
            next_validator_index: self.next_validator_index,
        }
    }

    fn create_account(
        &mut self,
        name: &str,
        path: String,
        kind: AccountKind,
        next_validator_index: Option<u32>,
    ) -> KeyVaultResult<Account> {
        if self.index.contains_name(name) {
            return Err(KeyVaultError::AlreadyExists(format!(
                "account '{name}' in wallet '{}'",
                self.name
            )));
        }

        let key = self.key.derive(&path)?;
        let record = AccountRecord {
            version: RECORD_VERSION,
            id: Uuid::new_v4(),
            wallet_id: self.id,
            name: name.to_string(),
            kind,
            path,
        };
        let account = Account::from_record(record, key, Arc::clone(&self.context));

        let previous_validator_index = self.next_validator_index;
        self.account_ids.push(account.id());
        self.index.insert(account.id(), name);
        if let Some(next) = next_validator_index {
            self.next_validator_index = next;
        }

        if let Err(err) = self.persist_new_account(&account) {
            self.account_ids.pop();
            self.index.remove(account.id());
            self.next_validator_index = previous_validator_index;
            log::warn!(
                "rolled back account '{name}' in wallet {}: {err}",
                self.id
            );
            return Err(err);
        }

        log::debug!(
            "registered {kind} account '{name}' ({}) at {}",
            account.id(),
            account.path()
        );
        Ok(account)
    }

    fn persist_new_account(&self, account: &Account) -> KeyVaultResult<()> {
        let storage = self.context.storage();
        storage.save_account(&account.to_record())?;
        storage.save_wallet(&self.to_record())?;
        Ok(())
    }
}

impl fmt::Debug for HdWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdWallet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("path", &self.key.path())
            .field("accounts", &self.account_ids.len())
            .finish_non_exhaustive()
    }
}
