//! Error types for store operations

/// Errors from vault refresh rotation. Lookup misses are `Option::None`
/// at the store API; these variants exist so the token handler can tell
/// "credential rejected" (fail the grant) from "transport failure"
/// (caller may retry).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vault record not found: {0}")]
    NotFound(String),

    #[error("upstream rejected refresh credential: {0}")]
    RefreshRejected(String),

    #[error("upstream refresh transport failure: {0}")]
    RefreshTransport(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
