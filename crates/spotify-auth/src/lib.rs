//! Upstream OAuth client leg for the Spotify bridge
//!
//! Everything this service needs to talk to the upstream identity provider
//! and to verify the client-facing PKCE leg. This crate is a standalone
//! library with no dependency on the bridge binary — it can be tested and
//! used independently.
//!
//! Flow, from the bridge's point of view:
//! 1. `/authorize` validates the client's challenge (`pkce::verify` happens
//!    later; here only the method is checked) and seals a `StateSnapshot`
//!    via `state::seal` into the upstream `state` parameter
//! 2. The upstream callback opens the snapshot with `state::open` if the
//!    in-memory transaction is gone, then calls `UpstreamClient::exchange_code`
//! 3. `/token` verifies the client's verifier with `pkce::verify_s256`
//! 4. Refresh grants call `UpstreamClient::refresh` when the mirrored
//!    upstream token is stale

pub mod constants;
pub mod error;
pub mod pkce;
pub mod state;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{compute_challenge, generate_client_state, generate_verifier, verify_s256};
pub use state::{StateSnapshot, derive_key, open, seal};
pub use token::{TokenResponse, UpstreamClient, UpstreamTokens, now_millis};
