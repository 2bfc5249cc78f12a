//! PKCE (Proof Key for Code Exchange) per RFC 7636, server side
//!
//! This service sits on the authorization-server side of the client-facing
//! leg: the client sends `code_challenge` at `/authorize` and proves
//! possession with `code_verifier` at `/token`. Only the S256 method is
//! supported; other methods are rejected when the flow starts, not at
//! verification time.
//!
//! Verification uses plain byte-for-byte equality: both sides are derived
//! values already bound to a single-use code, so a timing oracle on the
//! comparison yields nothing an attacker doesn't already hold.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Verify a client-supplied verifier against the stored challenge.
pub fn verify_s256(stored_challenge: &str, verifier: &str) -> bool {
    compute_challenge(verifier) == stored_challenge
}

/// Generate a cryptographically random PKCE code verifier.
///
/// Produces a 64-byte random value encoded as URL-safe base64 (no padding),
/// within the 43-128 character range RFC 7636 requires. The bridge itself
/// never needs a verifier, but test clients and the local-development
/// bridge tooling do.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque client state value for clients that omit `state`.
pub fn generate_client_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    format!("st_{}", URL_SAFE_NO_PAD.encode(bytes))
}
