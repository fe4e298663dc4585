//! Seed material the whole key tree is derived from.

use std::fmt;

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};

/// Length of a freshly generated seed.
pub const SEED_LEN: usize = 32;

/// The root secret of a portfolio.
///
/// The bytes live in a single zeroizing allocation. `Seed` is deliberately not
/// `Clone`: a vault shares one `Arc<Seed>` between all of its key nodes.
pub struct Seed(SecretBox<[u8]>);

impl Seed {
    /// Wraps caller-provided seed bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(SecretBox::new(bytes.into_boxed_slice()))
    }

    /// Generates a random 32-byte seed from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Returns the raw seed bytes. Treat this as sensitive material.
    #[must_use]
    pub fn expose_secret(&self) -> &[u8] {
        self.0.expose_secret()
    }

    /// Seed length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expose_secret().len()
    }

    /// Whether the seed is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<[u8; SEED_LEN]> for Seed {
    fn from(bytes: [u8; SEED_LEN]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed([REDACTED; {}])", self.len())
    }
}
