//! `keyvault-core` derives and manages Ethereum consensus-layer BLS keys.
//!
//! Keys come from one seed through EIP-2333 derivation along EIP-2334 paths:
//!
//! - a [`KeyVault`] owns the seed and the root node `m/12381/3600`;
//! - each [`HdWallet`] sits at `m/12381/3600/<i>` and owns a withdrawal
//!   account at `<wallet>/0` plus validator accounts at `<wallet>/0/<n>`;
//! - every [`Account`] signs with its own derived key.
//!
//! Persistence goes through the [`Storage`] trait. Only identifiers, names and
//! paths are stored; keys are re-derived from the seed on load.

pub mod crypto;
pub mod logger;
pub mod records;
pub mod storage;

mod account;
pub use account::Account;

mod context;
pub use context::PortfolioContext;

mod error;
pub use error::*;

mod key_node;
pub use key_node::{KeyNode, BASE_EIP2334_PATH};

mod options;
pub use options::PortfolioOptions;

mod seed;
pub use seed::{Seed, SEED_LEN};

mod vault;
pub use vault::KeyVault;

mod wallet;
pub use wallet::{validator_key_path, HdWallet, WITHDRAWAL_KEY_NAME, WITHDRAWAL_KEY_PATH};

pub use storage::{Encryptor, Storage, StorageError, StorageResult};
