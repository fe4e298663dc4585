//! Persisted shapes of portfolios, wallets and accounts.
//!
//! Records carry identifiers, names and derivation paths only. Key material is
//! always re-derived from the seed on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Current version of every record layout.
pub const RECORD_VERSION: u32 = 1;

/// Kind tag of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum WalletKind {
    /// EIP-2334 hierarchical deterministic wallet.
    #[serde(rename = "hd")]
    #[strum(serialize = "hd")]
    HierarchicalDeterministic,
}

/// Kind tag of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountKind {
    /// The wallet's single withdrawal key.
    Withdrawal,
    /// A validator signing key.
    Validator,
}

/// Snapshot of a portfolio, enough to reopen it together with the stored seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioRecord {
    /// Layout version.
    pub version: u32,
    /// Portfolio id.
    pub id: Uuid,
    /// Absolute path of the root key node.
    pub base_path: String,
    /// Wallet name to wallet id.
    pub wallets: BTreeMap<String, Uuid>,
    /// Index the next wallet will be derived at (relative to the root node).
    pub next_wallet_index: u32,
}

/// One entry of a wallet's account index, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Account id.
    pub id: Uuid,
    /// Account name, unique within the wallet.
    pub name: String,
}

/// Persisted wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Layout version.
    pub version: u32,
    /// Wallet id.
    pub id: Uuid,
    /// Owning portfolio id.
    pub portfolio_id: Uuid,
    /// Wallet name, unique within the portfolio.
    pub name: String,
    /// Wallet kind.
    pub kind: WalletKind,
    /// Path of the wallet node relative to the portfolio root node.
    pub path: String,
    /// Owned accounts in creation order.
    pub accounts: Vec<AccountEntry>,
    /// Index the next validator account will be derived at.
    pub next_validator_index: u32,
}

/// Persisted account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Layout version.
    pub version: u32,
    /// Account id.
    pub id: Uuid,
    /// Owning wallet id.
    pub wallet_id: Uuid,
    /// Account name.
    pub name: String,
    /// Account kind.
    pub kind: AccountKind,
    /// Path of the account node relative to the wallet node.
    pub path: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(WalletKind::HierarchicalDeterministic.to_string(), "hd");
        assert_eq!(AccountKind::Withdrawal.to_string(), "withdrawal");
        assert_eq!(
            AccountKind::from_str("validator").expect("parse"),
            AccountKind::Validator
        );
    }
}
