//! BLS12-381 key handles and the process-wide crypto initialization latch.
//!
//! Key derivation follows EIP-2333 and is delegated to `blst`. Paths follow
//! EIP-2334: `m` followed by `/`-separated decimal indices, no hardened markers.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use blst::{min_pk, BLST_ERROR};
use zeroize::Zeroizing;

use crate::error::{KeyVaultError, KeyVaultResult};

/// Domain separation tag for Ethereum consensus signatures (proof-of-possession scheme).
pub const SIGNATURE_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Minimum seed length accepted by EIP-2333.
pub const MIN_SEED_LEN: usize = 32;

const SELF_TEST_MESSAGE: &[u8] = b"keyvault:self-test";

static INIT: OnceLock<Result<(), String>> = OnceLock::new();
static INIT_RUNS: AtomicUsize = AtomicUsize::new(0);

/// Initializes the BLS subsystem for this process.
///
/// The setup (a derive/sign/verify self-test) runs exactly once per process.
/// Concurrent callers block until that single run completes and all of them
/// observe the same outcome.
///
/// # Errors
///
/// Returns [`KeyVaultError::CryptoInit`] if the self-test failed. The failure
/// is sticky: every later call returns the same error.
pub fn init() -> KeyVaultResult<()> {
    INIT.get_or_init(|| {
        INIT_RUNS.fetch_add(1, Ordering::SeqCst);
        let result = self_test();
        match &result {
            Ok(()) => log::debug!("BLS self-test passed"),
            Err(err) => log::error!("BLS self-test failed: {err}"),
        }
        result
    })
    .clone()
    .map_err(KeyVaultError::CryptoInit)
}

/// Number of times the initialization body has executed in this process (0 or 1).
#[must_use]
pub fn init_runs() -> usize {
    INIT_RUNS.load(Ordering::SeqCst)
}

fn self_test() -> Result<(), String> {
    let master = min_pk::SecretKey::derive_master_eip2333(&[0x42; MIN_SEED_LEN])
        .map_err(|err| format!("master derivation failed: {err:?}"))?;
    let child = master.derive_child_eip2333(0);
    if Zeroizing::new(child.to_bytes()) == Zeroizing::new(master.to_bytes()) {
        return Err("child key equals master key".to_string());
    }

    let signature = child.sign(SELF_TEST_MESSAGE, SIGNATURE_DST, &[]);
    let verified = signature.verify(
        true,
        SELF_TEST_MESSAGE,
        SIGNATURE_DST,
        &[],
        &child.sk_to_pk(),
        true,
    );
    if verified != BLST_ERROR::BLST_SUCCESS {
        return Err(format!("signature verification failed: {verified:?}"));
    }
    Ok(())
}

/// Parses an EIP-2334 path (`m/12381/3600/0`) into its child indices.
///
/// # Errors
///
/// Returns [`KeyVaultError::Derivation`] if the path does not start with `m`,
/// contains an empty segment, or a segment is not a decimal `u32`.
pub fn parse_path(path: &str) -> KeyVaultResult<Vec<u32>> {
    let mut segments = path.split('/');
    if segments.next() != Some("m") {
        return Err(KeyVaultError::Derivation(format!(
            "path '{path}' must start with 'm'"
        )));
    }

    segments
        .map(|segment| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(KeyVaultError::Derivation(format!(
                    "invalid segment '{segment}' in path '{path}'"
                )));
            }
            segment.parse::<u32>().map_err(|err| {
                KeyVaultError::Derivation(format!(
                    "segment '{segment}' in path '{path}': {err}"
                ))
            })
        })
        .collect()
}

/// Derives the private key at `path` from `seed` (EIP-2333).
pub(crate) fn derive_private_key(seed: &[u8], path: &str) -> KeyVaultResult<PrivateKey> {
    if seed.len() < MIN_SEED_LEN {
        return Err(KeyVaultError::Derivation(format!(
            "seed must be at least {MIN_SEED_LEN} bytes, got {}",
            seed.len()
        )));
    }
    let indices = parse_path(path)?;

    let mut key = min_pk::SecretKey::derive_master_eip2333(seed).map_err(|err| {
        KeyVaultError::Derivation(format!("master key derivation failed: {err:?}"))
    })?;
    for index in indices {
        key = key.derive_child_eip2333(index);
    }
    Ok(PrivateKey(key))
}

/// A BLS12-381 private key. Zeroized on drop; never printed.
pub struct PrivateKey(min_pk::SecretKey);

impl PrivateKey {
    /// Returns the big-endian scalar bytes. Treat as sensitive material.
    #[must_use]
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Returns the matching compressed G1 public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.sk_to_pk().to_bytes())
    }

    /// Signs `message` with the Ethereum consensus DST.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message, SIGNATURE_DST, &[]).to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// A compressed BLS12-381 G1 public key (48 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 48]);

impl PublicKey {
    /// Returns the compressed point bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 48] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

/// A compressed BLS12-381 G2 signature (96 bytes).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 96]);

impl Signature {
    /// Returns the compressed point bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 96] {
        &self.0
    }

    /// Verifies this signature over `message` against `public_key`.
    #[must_use]
    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> bool {
        let Ok(public_key) = min_pk::PublicKey::from_bytes(public_key.as_bytes()) else {
            return false;
        };
        let Ok(signature) = min_pk::Signature::from_bytes(&self.0) else {
            return false;
        };
        signature.verify(true, message, SIGNATURE_DST, &[], &public_key, true)
            == BLST_ERROR::BLST_SUCCESS
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_init_runs_once_across_threads() {
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(init)).collect();
            for handle in handles {
                handle.join().expect("join").expect("init");
            }
        });
        init().expect("init again");
        assert_eq!(init_runs(), 1);
    }

    #[test_case("m", &[] ; "master only")]
    #[test_case("m/12381/3600", &[12381, 3600] ; "base path")]
    #[test_case("m/12381/3600/0/0/7", &[12381, 3600, 0, 0, 7] ; "validator path")]
    fn test_parse_path(path: &str, expected: &[u32]) {
        assert_eq!(parse_path(path).expect("parse"), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("12381/3600" ; "missing master")]
    #[test_case("m/12381//0" ; "empty segment")]
    #[test_case("m/12381/" ; "trailing slash")]
    #[test_case("m/+1" ; "sign prefix")]
    #[test_case("m/44'/60'" ; "hardened marker")]
    #[test_case("m/4294967296" ; "index overflow")]
    fn test_parse_path_rejects(path: &str) {
        match parse_path(path) {
            Err(KeyVaultError::Derivation(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_short_seed_rejected() {
        match derive_private_key(&[7u8; 31], "m/12381") {
            Err(KeyVaultError::Derivation(msg)) => assert!(msg.contains("31")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_derivation_matches_eip2333_vector() {
        let seed = hex::decode(
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e5349553\
             1f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04",
        )
        .expect("seed hex");

        let master = derive_private_key(&seed, "m").expect("master");
        assert_eq!(
            hex::encode(*master.to_bytes()),
            "0d7359d57963ab8fbbde1852dcf553fedbc31f464d80ee7d40ae683122b45070"
        );
        let child = derive_private_key(&seed, "m/0").expect("child");
        assert_eq!(
            hex::encode(*child.to_bytes()),
            "2d18bd6c14e6d15bf8b5085c9b74f3daae3b03cc2014770a599d8c1539e50f8e"
        );
    }

    #[test]
    fn test_sign_and_verify() {
        init().expect("init");
        let key = derive_private_key(&[1u8; 32], "m/12381/3600/0/0/0").expect("derive");
        let other = derive_private_key(&[1u8; 32], "m/12381/3600/0/0/1").expect("derive");

        let signature = key.sign(b"attestation");
        assert!(signature.verify(&key.public_key(), b"attestation"));
        assert!(!signature.verify(&key.public_key(), b"proposal"));
        assert!(!signature.verify(&other.public_key(), b"attestation"));
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key = derive_private_key(&[1u8; 32], "m").expect("derive");
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "PrivateKey([REDACTED])");
        assert!(!rendered.contains(&hex::encode(*key.to_bytes())));
    }
}
