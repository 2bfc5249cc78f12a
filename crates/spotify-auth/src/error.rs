//! Error types for upstream OAuth operations

/// Errors from upstream OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("state sealing failed: {0}")]
    State(String),
}

/// Result alias for upstream auth operations.
pub type Result<T> = std::result::Result<T, Error>;
