//! Credential vault: AES-256-GCM encryption of secret material at rest.
//!
//! Ciphertext layout is self-describing: a version byte, the random 12-byte
//! nonce, then the GCM ciphertext+tag. Associated data binds a ciphertext to
//! its context (tenant and platform) so records cannot be swapped between
//! rows without detection.
//!
//! Operational constraint: the vault key must never change once any record
//! has been encrypted with it. There is no re-encryption migration; rotating
//! the key makes every stored credential permanently unreadable.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_SEALED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_SEALED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

/// Vault error types
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption failed: {0}")]
    Encryption(String),
    /// Wrong key, tampered ciphertext, or mismatched context. Kept distinct
    /// from not-found so an operational incident never reads as a 404.
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Secure wrapper for the vault key with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey(Vec<u8>);

impl VaultKey {
    /// Create a vault key from raw bytes; must be exactly 32 bytes.
    pub fn new(bytes: Vec<u8>) -> Result<Self, VaultError> {
        if bytes.len() != 32 {
            return Err(VaultError::InvalidKeyLength(bytes.len()));
        }
        Ok(VaultKey(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Symmetric vault over a single long-lived key.
///
/// The key is immutable configuration handed in at construction; there is no
/// mutation path at runtime.
#[derive(Clone)]
pub struct Vault {
    key: VaultKey,
}

impl Vault {
    pub fn new(key: VaultKey) -> Self {
        Self { key }
    }

    /// Encrypt plaintext bound to the given associated data.
    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let cipher_key = Key::<Aes256Gcm>::from_slice(self.key.as_bytes());
        let cipher = Aes256Gcm::new(cipher_key);

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let mut ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
        sealed.push(VERSION_SEALED);
        sealed.extend_from_slice(&nonce);
        sealed.append(&mut ciphertext);

        Ok(sealed)
    }

    /// Decrypt a sealed payload produced by [`Vault::seal`] with the same
    /// associated data. Any tampering or key mismatch fails with
    /// [`VaultError::Decryption`]; corrupted plaintext is never returned.
    pub fn open(&self, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, VaultError> {
        if sealed.len() < MIN_SEALED_LEN || sealed[0] != VERSION_SEALED {
            return Err(VaultError::InvalidFormat);
        }

        let nonce = Nonce::from_slice(&sealed[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
        let ciphertext = &sealed[VERSION_FIELD_LEN + NONCE_LEN..];

        let cipher_key = Key::<Aes256Gcm>::from_slice(self.key.as_bytes());
        let cipher = Aes256Gcm::new(cipher_key);

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|e| VaultError::Decryption(e.to_string()))
    }

    /// Decrypt and interpret the plaintext as UTF-8.
    pub fn open_string(&self, aad: &[u8], sealed: &[u8]) -> Result<String, VaultError> {
        let bytes = self.open(aad, sealed)?;
        String::from_utf8(bytes).map_err(|e| VaultError::Decryption(format!("invalid UTF-8: {e}")))
    }
}

/// Associated data binding a credential ciphertext to its owning row.
pub fn credential_aad(tenant_id: uuid::Uuid, platform: &str) -> Vec<u8> {
    format!("{tenant_id}|{platform}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> Vault {
        Vault::new(VaultKey::new(vec![7u8; 32]).expect("valid test key"))
    }

    #[test]
    fn seal_open_roundtrip() {
        let vault = test_vault();
        let sealed = vault.seal(b"ctx", b"secret material").expect("seal");
        let opened = vault.open(b"ctx", &sealed).expect("open");
        assert_eq!(opened, b"secret material");
    }

    #[test]
    fn roundtrip_arbitrary_bytes() {
        let vault = test_vault();
        for plaintext in [&b""[..], &[0u8, 255, 1, 254][..], &[0u8; 4096][..]] {
            let sealed = vault.seal(b"ctx", plaintext).expect("seal");
            assert_eq!(vault.open(b"ctx", &sealed).expect("open"), plaintext);
        }
    }

    #[test]
    fn different_key_fails_with_decryption_error() {
        let vault_a = test_vault();
        let vault_b = Vault::new(VaultKey::new(vec![8u8; 32]).expect("valid key"));

        let sealed = vault_a.seal(b"ctx", b"secret").expect("seal");
        let result = vault_b.open(b"ctx", &sealed);
        assert!(matches!(result, Err(VaultError::Decryption(_))));
    }

    #[test]
    fn different_aad_fails() {
        let vault = test_vault();
        let sealed = vault.seal(b"tenant-a|meta", b"secret").expect("seal");
        assert!(vault.open(b"tenant-b|meta", &sealed).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let vault = test_vault();
        let mut sealed = vault.seal(b"ctx", b"secret").expect("seal");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            vault.open(b"ctx", &sealed),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn unversioned_payload_rejected() {
        let vault = test_vault();
        let result = vault.open(b"ctx", b"not-a-sealed-payload-at-all-really");
        assert!(matches!(result, Err(VaultError::InvalidFormat)));
    }

    #[test]
    fn truncated_payload_rejected() {
        let vault = test_vault();
        let result = vault.open(b"ctx", &[VERSION_SEALED, 0x02, 0x03]);
        assert!(matches!(result, Err(VaultError::InvalidFormat)));
    }

    #[test]
    fn nonce_unique_per_call() {
        let vault = test_vault();
        let a = vault.seal(b"ctx", b"secret").expect("seal");
        let b = vault.seal(b"ctx", b"secret").expect("seal");
        assert_ne!(a[1..13], b[1..13]);
        assert_eq!(vault.open(b"ctx", &a).expect("open"), b"secret");
        assert_eq!(vault.open(b"ctx", &b).expect("open"), b"secret");
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            VaultKey::new(vec![0u8; 16]),
            Err(VaultError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            VaultKey::new(vec![0u8; 64]),
            Err(VaultError::InvalidKeyLength(64))
        ));
    }
}
