//! Shared mutable state for in-flight and completed authorization flows
//!
//! Three stores, each owning its records exclusively:
//!
//! - [`TransactionStore`] — short-lived, one entry per authorization
//!   attempt, TTL-swept by a background task
//! - [`SessionStore`] — long-lived, one entry per client-declared session
//!   id, never deleted, token payload mutates last-write-wins
//! - [`TokenVault`] — long-lived, one entry per issued RS refresh token,
//!   access token rotates on refresh grants
//!
//! A transaction's `session_id` is a non-owning reference into the session
//! store: deleting a transaction never touches the session. All stores
//! provide atomic single-key operations behind one mutex each; no lock is
//! ever held across an upstream HTTP call.

pub mod error;
pub mod session;
pub mod transaction;
pub mod vault;

pub use error::{Error, Result};
pub use session::{Session, SessionStore};
pub use transaction::{
    SWEEP_INTERVAL, TRANSACTION_TTL, Transaction, TransactionStore, spawn_sweep_task,
};
pub use vault::{REFRESH_MARGIN_MILLIS, RS_ACCESS_TTL_SECS, TokenVault, VaultRecord};
