//! Path-addressed nodes of the EIP-2333 derivation tree.
//!
//! Every node keeps the root seed and its absolute path. Deriving a child
//! recomputes the key from `(seed, parent_path/segment)` instead of chaining
//! from the parent key, so any node can be rebuilt from the seed and its path
//! alone.

use std::fmt;
use std::sync::Arc;

use crate::crypto::{self, PrivateKey, PublicKey};
use crate::error::{KeyVaultError, KeyVaultResult};
use crate::seed::Seed;

/// Purpose/coin-type prefix defined by EIP-2334.
pub const BASE_EIP2334_PATH: &str = "m/12381/3600";

/// A derivation-tree node: a path and the private key it addresses.
pub struct KeyNode {
    seed: Arc<Seed>,
    key: PrivateKey,
    path: String,
}

impl KeyNode {
    /// Builds the base node (`m/12381/3600`) for `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Derivation`] if the seed is rejected.
    pub fn base_from_seed(seed: Seed) -> KeyVaultResult<Self> {
        Self::from_seed_and_path(Arc::new(seed), BASE_EIP2334_PATH)
    }

    /// Builds the node at an absolute `path` for a shared seed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Derivation`] if the seed or path is malformed.
    pub fn from_seed_and_path(seed: Arc<Seed>, path: &str) -> KeyVaultResult<Self> {
        let key = crypto::derive_private_key(seed.expose_secret(), path)?;
        Ok(Self {
            seed,
            key,
            path: path.to_string(),
        })
    }

    /// Derives the child at `relative_path` (e.g. `0` or `0/3`) below this node.
    ///
    /// # Errors
    ///
    /// Returns [`KeyVaultError::Derivation`] if the relative path is empty or
    /// the resulting path is malformed.
    pub fn derive(&self, relative_path: &str) -> KeyVaultResult<Self> {
        let relative_path = relative_path.trim_start_matches('/');
        if relative_path.is_empty() {
            return Err(KeyVaultError::Derivation(
                "relative path must not be empty".to_string(),
            ));
        }
        let path = format!("{}/{relative_path}", self.path);
        log::trace!("deriving key at {path}");
        Self::from_seed_and_path(Arc::clone(&self.seed), &path)
    }

    /// Absolute derivation path of this node.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The private key addressed by this node.
    #[must_use]
    pub const fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    /// The public key addressed by this node.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    pub(crate) const fn seed(&self) -> &Arc<Seed> {
        &self.seed
    }
}

impl fmt::Debug for KeyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNode")
            .field("path", &self.path)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn zero_seed() -> Seed {
        Seed::from([0u8; 32])
    }

    #[test]
    fn test_base_key_is_deterministic() {
        let first = KeyNode::base_from_seed(zero_seed()).expect("base");
        let second = KeyNode::base_from_seed(zero_seed()).expect("base");

        assert_eq!(first.path(), BASE_EIP2334_PATH);
        assert_eq!(
            *first.private_key().to_bytes(),
            *second.private_key().to_bytes()
        );
    }

    #[test]
    fn test_zero_seed_keys_are_pinned() {
        let base = KeyNode::base_from_seed(zero_seed()).expect("base");
        assert_eq!(
            hex::encode(*base.private_key().to_bytes()),
            "2c725fe179146010d7132766127add396638de58880a6406c1d9843da67fee9c"
        );
        assert_eq!(
            base.public_key().to_string(),
            "0xb508040c4cfa16747b781509efac5b77fc58f11d9995df4a3b0dc31c5dc93917\
             6f0cf940cc6b5aaed6bdbf21672aa627"
        );

        let withdrawal = base.derive("0/0").expect("withdrawal");
        assert_eq!(
            withdrawal.public_key().to_string(),
            "0x8a4dd69aef05c8e58c2b02cbe009e8419eb83956296e58113d93f91c24d5cdf4\
             a065fe976ce77522e7b53b3be26aa12d"
        );
    }

    #[test_case("0", "m/12381/3600/0" ; "wallet")]
    #[test_case("0/0", "m/12381/3600/0/0" ; "withdrawal")]
    #[test_case("/1/0/5", "m/12381/3600/1/0/5" ; "leading slash")]
    fn test_child_matches_direct_derivation(segment: &str, full_path: &str) {
        let seed = Arc::new(Seed::from([0x11u8; 32]));
        let base = KeyNode::from_seed_and_path(Arc::clone(&seed), BASE_EIP2334_PATH)
            .expect("base");

        let child = base.derive(segment).expect("child");
        let direct = KeyNode::from_seed_and_path(seed, full_path).expect("direct");

        assert_eq!(child.path(), full_path);
        assert_eq!(*child.private_key().to_bytes(), *direct.private_key().to_bytes());
    }

    #[test]
    fn test_grandchild_matches_concatenated_path() {
        let base = KeyNode::base_from_seed(Seed::from([0x22u8; 32])).expect("base");
        let chained = base
            .derive("4")
            .and_then(|wallet| wallet.derive("0"))
            .and_then(|withdrawal| withdrawal.derive("9"))
            .expect("chained");
        let direct = base.derive("4/0/9").expect("direct");

        assert_eq!(chained.path(), direct.path());
        assert_eq!(chained.public_key(), direct.public_key());
    }

    #[test]
    fn test_children_share_the_seed_allocation() {
        let base = KeyNode::base_from_seed(zero_seed()).expect("base");
        let child = base.derive("0").expect("child");
        assert!(Arc::ptr_eq(base.seed(), child.seed()));
    }

    #[test]
    fn test_siblings_differ() {
        let base = KeyNode::base_from_seed(zero_seed()).expect("base");
        let first = base.derive("0/0").expect("first");
        let second = base.derive("0/1").expect("second");
        assert_ne!(first.public_key(), second.public_key());
    }

    #[test_case("" ; "empty")]
    #[test_case("/" ; "only slash")]
    #[test_case("0//1" ; "empty segment")]
    #[test_case("x" ; "non numeric")]
    fn test_invalid_relative_path(segment: &str) {
        let base = KeyNode::base_from_seed(zero_seed()).expect("base");
        match base.derive(segment) {
            Err(KeyVaultError::Derivation(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_short_seed_fails() {
        match KeyNode::base_from_seed(Seed::new(vec![1u8; 16])) {
            Err(KeyVaultError::Derivation(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
