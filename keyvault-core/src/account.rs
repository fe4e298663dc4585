//! Accounts: one derived BLS key pair with its name and owning wallet.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::context::PortfolioContext;
use crate::crypto::{PublicKey, Signature};
use crate::key_node::KeyNode;
use crate::records::{AccountKind, AccountRecord, RECORD_VERSION};

/// A single usable key derived from a wallet.
pub struct Account {
    id: Uuid,
    name: String,
    kind: AccountKind,
    wallet_id: Uuid,
    relative_path: String,
    key: KeyNode,
    context: Arc<PortfolioContext>,
}

impl Account {
    /// Rebuilds an account from its record and the key re-derived at `record.path`.
    pub(crate) fn from_record(
        record: AccountRecord,
        key: KeyNode,
        context: Arc<PortfolioContext>,
    ) -> Self {
        Self {
            id: record.id,
            name: record.name,
            kind: record.kind,
            wallet_id: record.wallet_id,
            relative_path: record.path,
            key,
            context,
        }
    }

    /// Account id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Account name, unique within its wallet.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Withdrawal or validator.
    #[must_use]
    pub const fn kind(&self) -> AccountKind {
        self.kind
    }

    /// Id of the owning wallet.
    #[must_use]
    pub const fn wallet_id(&self) -> Uuid {
        self.wallet_id
    }

    /// Id of the portfolio the owning wallet belongs to.
    #[must_use]
    pub fn portfolio_id(&self) -> Uuid {
        self.context.portfolio_id()
    }

    /// Absolute derivation path of the account key.
    #[must_use]
    pub fn path(&self) -> &str {
        self.key.path()
    }

    /// Derivation path relative to the wallet node.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// The account's BLS public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Signs `message` with the account key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.key.private_key().sign(message)
    }

    /// The persisted form of this account.
    #[must_use]
    pub fn to_record(&self) -> AccountRecord {
        AccountRecord {
            version: RECORD_VERSION,
            id: self.id,
            wallet_id: self.wallet_id,
            name: self.name.clone(),
            kind: self.kind,
            path: self.relative_path.clone(),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("path", &self.key.path())
            .finish_non_exhaustive()
    }
}
