//! OAuth error responses for the client-facing endpoints
//!
//! Every failure on `/authorize` query validation, `/token`, and `/revoke`
//! renders as the standard OAuth JSON shape `{"error": "<code>"}`. The
//! variant decides both the code string and the HTTP status; messages are
//! logged but never sent to the client — upstream error bodies may carry
//! token material.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    /// PKCE parameters absent or using an unsupported method
    #[error("invalid code challenge: {0}")]
    InvalidCodeChallenge(String),

    /// Unknown, expired, replayed, or PKCE-mismatched grant material
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Request body that could not be parsed at all
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream transport failure; the client may retry
    #[error("upstream failure: {0}")]
    ServerError(String),

    /// Revocation requested but no upstream revocation endpoint configured
    #[error("revocation not supported")]
    NotImplemented,
}

impl OAuthError {
    /// The `error` code string in the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCodeChallenge(_) => "invalid_code_challenge",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ServerError(_) => "server_error",
            Self::NotImplemented => "not_implemented",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCodeChallenge(_)
            | Self::InvalidGrant(_)
            | Self::UnsupportedGrantType(_)
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, code = self.code(), "oauth error response");
        (self.status(), Json(serde_json::json!({ "error": self.code() }))).into_response()
    }
}
