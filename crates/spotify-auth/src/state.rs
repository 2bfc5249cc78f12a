//! Sealed composite state for stateless flow recovery
//!
//! The `state` parameter round-tripped through the upstream provider
//! carries an AES-256-GCM encrypted snapshot of the transaction's
//! identifying fields. A callback landing on a different process instance
//! — or one that has since evicted the transaction — can reconstruct the
//! transaction from the snapshot alone, at the cost of trusting the
//! upstream provider to return `state` unmodified (the GCM tag rejects
//! anything else).
//!
//! Wire format:  base64url( nonce || ciphertext || tag )
//!
//! The plaintext is the JSON serialization of [`StateSnapshot`]. Decoding
//! is total: malformed, truncated, or tampered input yields `None`, never
//! an error past this boundary.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Minimal transaction snapshot carried through the upstream `state`
/// parameter. Holds identifying fields only — never token material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub txn_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub client_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_redirect_uri: Option<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Derive a 256-bit AES key from the configured state secret.
/// Hashing gives a clean 32-byte key regardless of the secret's length.
pub fn derive_key(state_secret: &[u8]) -> [u8; 32] {
    Sha256::digest(state_secret).into()
}

/// Seal a snapshot into an ASCII-safe token for the `state` parameter.
///
/// A fresh random 96-bit nonce is generated per call; calls are fully
/// independent of each other.
pub fn seal(snapshot: &StateSnapshot, key: &[u8; 32]) -> Result<String> {
    let plaintext = serde_json::to_vec(snapshot)
        .map_err(|e| Error::State(format!("failed to serialize snapshot: {e}")))?;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::State(format!("failed to create cipher: {e}")))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_ref())
        .map_err(|e| Error::State(format!("encryption failed: {e}")))?;

    // Wire format: nonce (12 bytes) || ciphertext+tag
    let mut blob = Vec::with_capacity(12 + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    Ok(URL_SAFE_NO_PAD.encode(&blob))
}

/// Open a sealed state token back into a snapshot.
///
/// Returns `None` for anything that is not a well-formed token sealed
/// under the same key: bad base64, short blobs, wrong key, flipped bits,
/// corrupt JSON. Callers treat `None` as "absent" and decide whether that
/// is a client error or a dead end.
pub fn open(token: &str, key: &[u8; 32]) -> Option<StateSnapshot> {
    let blob = URL_SAFE_NO_PAD.decode(token).ok()?;

    // 12 bytes nonce + 16 byte tag minimum
    if blob.len() < 28 {
        return None;
    }

    let (nonce_bytes, ciphertext) = blob.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).ok()?;
    let plaintext = cipher.decrypt(nonce, ciphertext).ok()?;

    serde_json::from_slice(&plaintext).ok()
}
