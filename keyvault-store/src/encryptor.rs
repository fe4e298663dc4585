//! Password-based seed encryption.
//!
//! The password is stretched with Argon2id into a 256-bit key, which seals the
//! plaintext with XChaCha20-Poly1305 under a random 192-bit nonce. Salt, nonce
//! and KDF parameters travel with the ciphertext in a versioned CBOR envelope,
//! so the parameters can change without breaking existing blobs.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use keyvault_core::{Encryptor, StorageError, StorageResult};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

const ENVELOPE_VERSION: u32 = 1;
const ASSOCIATED_DATA: &[u8] = b"keyvault:seed:v1";
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    fn derive_key(
        self,
        password: &SecretString,
        salt: &[u8],
    ) -> StorageResult<Zeroizing<[u8; KEY_LEN]>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|err| StorageError::Crypto(format!("invalid argon2 parameters: {err}")))?;

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key[..])
            .map_err(|err| StorageError::Crypto(format!("key stretching failed: {err}")))?;
        Ok(key)
    }
}

#[derive(Serialize, Deserialize)]
struct SealedEnvelope {
    version: u32,
    kdf: KdfParams,
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    fn serialize(&self) -> StorageResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(bytes)
    }

    fn deserialize(bytes: &[u8]) -> StorageResult<Self> {
        let envelope: Self = ciborium::de::from_reader(bytes)
            .map_err(|err| StorageError::InvalidEnvelope(err.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }
        if envelope.salt.len() != SALT_LEN || envelope.nonce.len() != NONCE_LEN {
            return Err(StorageError::InvalidEnvelope(
                "unexpected salt or nonce length".to_string(),
            ));
        }
        Ok(envelope)
    }
}

/// Argon2id + XChaCha20-Poly1305 [`Encryptor`].
#[derive(Debug, Clone, Default)]
pub struct PasswordEncryptor {
    params: KdfParams,
}

impl PasswordEncryptor {
    /// Encryptor with the default Argon2id cost (19 MiB, 2 passes).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encryptor with explicit Argon2id costs for newly sealed data.
    ///
    /// Decryption always uses the costs recorded in the envelope.
    #[must_use]
    pub const fn with_params(params: KdfParams) -> Self {
        Self { params }
    }

    fn cipher(key: &[u8; KEY_LEN]) -> StorageResult<XChaCha20Poly1305> {
        XChaCha20Poly1305::new_from_slice(key)
            .map_err(|err| StorageError::Crypto(format!("invalid key length: {err}")))
    }
}

impl Encryptor for PasswordEncryptor {
    fn encrypt(&self, password: &SecretString, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = self.params.derive_key(password, &salt)?;
        let ciphertext = Self::cipher(&key)?
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: ASSOCIATED_DATA,
                },
            )
            .map_err(|_| StorageError::Crypto("encryption failed".to_string()))?;

        SealedEnvelope {
            version: ENVELOPE_VERSION,
            kdf: self.params,
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
        }
        .serialize()
    }

    fn decrypt(&self, password: &SecretString, ciphertext: &[u8]) -> StorageResult<Vec<u8>> {
        let envelope = SealedEnvelope::deserialize(ciphertext)?;
        let key = envelope.kdf.derive_key(password, &envelope.salt)?;
        Self::cipher(&key)?
            .decrypt(
                XNonce::from_slice(&envelope.nonce),
                Payload {
                    msg: &envelope.ciphertext,
                    aad: ASSOCIATED_DATA,
                },
            )
            .map_err(|_| StorageError::Crypto("wrong password or corrupted data".to_string()))
    }
}

#[cfg(test)]
pub(crate) const TEST_PARAMS: KdfParams = KdfParams {
    memory_kib: 64,
    iterations: 1,
    parallelism: 1,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn password(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let encryptor = PasswordEncryptor::with_params(TEST_PARAMS);
        let sealed = encryptor
            .encrypt(&password("correct horse"), b"seed bytes")
            .expect("encrypt");
        assert!(!sealed.windows(10).any(|window| window == b"seed bytes"));

        let opened = encryptor
            .decrypt(&password("correct horse"), &sealed)
            .expect("decrypt");
        assert_eq!(opened, b"seed bytes");
    }

    #[test]
    fn test_same_plaintext_seals_differently() {
        let encryptor = PasswordEncryptor::with_params(TEST_PARAMS);
        let first = encryptor.encrypt(&password("pw"), b"seed").expect("first");
        let second = encryptor.encrypt(&password("pw"), b"seed").expect("second");
        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_password_fails() {
        let encryptor = PasswordEncryptor::with_params(TEST_PARAMS);
        let sealed = encryptor.encrypt(&password("right"), b"seed").expect("encrypt");
        match encryptor.decrypt(&password("wrong"), &sealed) {
            Err(StorageError::Crypto(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_envelope_version_mismatch() {
        let encryptor = PasswordEncryptor::with_params(TEST_PARAMS);
        let sealed = encryptor.encrypt(&password("pw"), b"seed").expect("encrypt");
        let mut envelope = SealedEnvelope::deserialize(&sealed).expect("envelope");
        envelope.version = ENVELOPE_VERSION + 1;
        let bytes = envelope.serialize().expect("serialize");

        match encryptor.decrypt(&password("pw"), &bytes) {
            Err(StorageError::UnsupportedVersion(version)) => {
                assert_eq!(version, ENVELOPE_VERSION + 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_an_invalid_envelope() {
        let encryptor = PasswordEncryptor::with_params(TEST_PARAMS);
        match encryptor.decrypt(&password("pw"), b"not cbor at all") {
            Err(StorageError::InvalidEnvelope(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
