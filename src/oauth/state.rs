//! Sealed OAuth state tokens.
//!
//! The `state` parameter round-trips through the provider as an opaque
//! string. It is a vault-sealed JSON document, so a forged or replayed-late
//! callback cannot recover or fabricate tenant context: validation fails
//! closed on any tamper, wrong key, or age past the configured TTL.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::vault::Vault;

/// Associated data binding sealed state tokens to this use, so a credential
/// ciphertext can never be replayed as a state token or vice versa.
const STATE_AAD: &[u8] = b"oauth-state";

const NONCE_BYTES: usize = 16;

/// State token validation errors. Deliberately coarse: callers learn only
/// invalid-vs-expired, nothing about why decryption failed.
#[derive(Debug, Error)]
pub enum StateTokenError {
    #[error("state token is invalid")]
    Invalid,
    #[error("state token expired {age_seconds}s after issue")]
    Expired { age_seconds: i64 },
    #[error("state token could not be sealed: {0}")]
    Seal(String),
}

/// Tenant context carried through the provider redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateToken {
    pub tenant_id: Uuid,
    pub platform: String,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl StateToken {
    /// Mint a fresh token with a random nonce, issued now.
    pub fn mint(tenant_id: Uuid, platform: &str) -> Self {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        Self {
            tenant_id,
            platform: platform.to_string(),
            nonce: hex::encode(nonce),
            issued_at: Utc::now(),
        }
    }

    /// Seal into the opaque URL-safe string handed to the provider.
    pub fn seal(&self, vault: &Vault) -> Result<String, StateTokenError> {
        let plaintext =
            serde_json::to_vec(self).map_err(|e| StateTokenError::Seal(e.to_string()))?;
        let sealed = vault
            .seal(STATE_AAD, &plaintext)
            .map_err(|e| StateTokenError::Seal(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Validate and open a sealed token.
    ///
    /// Rejects anything that does not decode, decrypt, and parse, and any
    /// token older than `ttl_seconds` at `now`.
    pub fn open(
        vault: &Vault,
        encoded: &str,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, StateTokenError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| StateTokenError::Invalid)?;
        let plaintext = vault
            .open(STATE_AAD, &sealed)
            .map_err(|_| StateTokenError::Invalid)?;
        let token: StateToken =
            serde_json::from_slice(&plaintext).map_err(|_| StateTokenError::Invalid)?;

        let age_seconds = (now - token.issued_at).num_seconds();
        if age_seconds < 0 {
            // Issued in the future: clock skew beyond tolerance or forgery.
            return Err(StateTokenError::Invalid);
        }
        if age_seconds as u64 > ttl_seconds {
            return Err(StateTokenError::Expired { age_seconds });
        }

        Ok(token)
    }
}
