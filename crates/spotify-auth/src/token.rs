//! Upstream token exchange and refresh
//!
//! The bridge is a confidential client toward the upstream provider: both
//! token-endpoint interactions send HTTP basic auth with the bridge's own
//! client id and secret over form-encoded bodies. The client-facing PKCE
//! leg never reaches upstream.
//!
//! A 401/403 (or an explicit `invalid_grant` error body) from the token
//! endpoint means the credential itself was rejected and maps to
//! `Error::InvalidCredentials`; transport failures map to `Error::Http` so
//! callers can distinguish "don't retry" from "safe to retry".

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Response from the upstream token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time; `refresh_token`
/// may be absent on refresh responses (the provider keeps the old one valid).
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// The upstream token set mirrored by transactions, sessions, and vault
/// records. `expires_at` is an absolute unix timestamp in milliseconds,
/// computed at storage time from `expires_in`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<u64>,
    pub scope: String,
}

impl UpstreamTokens {
    /// Build a token set from an endpoint response, anchoring the expiry
    /// to `now` (unix milliseconds).
    pub fn from_response(response: TokenResponse, now: u64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_in.map(|secs| now + secs * 1000),
            scope: response.scope.unwrap_or_default(),
        }
    }

    /// Whether the access token expires within `margin` milliseconds of
    /// `now`. A token with no known expiry counts as stale.
    pub fn expires_within(&self, margin: u64, now: u64) -> bool {
        match self.expires_at {
            Some(at) => at <= now + margin,
            None => true,
        }
    }
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Confidential-client handle for the upstream token and revocation
/// endpoints. Cheap to clone-by-Arc and share across request handlers.
pub struct UpstreamClient {
    http: reqwest::Client,
    token_endpoint: String,
    revocation_endpoint: Option<String>,
    client_id: String,
    client_secret: Secret<String>,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        token_endpoint: String,
        revocation_endpoint: Option<String>,
        client_id: String,
        client_secret: Secret<String>,
    ) -> Self {
        Self {
            http,
            token_endpoint,
            revocation_endpoint,
            client_id,
            client_secret,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn revocation_endpoint(&self) -> Option<&str> {
        self.revocation_endpoint.as_deref()
    }

    /// Exchange an upstream authorization code for tokens.
    ///
    /// `redirect_uri` must be the bridge's own callback URL — the one the
    /// upstream provider just redirected to — not the client's target.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
    }

    /// Refresh an upstream access token using a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 400 invalid_grant / 401 / 403 mean the refresh token is
            // revoked or invalid — not retryable
            if status.as_u16() == 401
                || status.as_u16() == 403
                || (status.as_u16() == 400 && body.contains("invalid_grant"))
            {
                return Err(Error::InvalidCredentials(format!(
                    "refresh token rejected ({status}): {body}"
                )));
            }

            return Err(Error::TokenExchange(format!(
                "token refresh returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
    }

    /// Forward a revocation request body verbatim to the upstream
    /// revocation endpoint. Returns the upstream status and body; callers
    /// decide how to surface them. Errors only on transport failure or
    /// when no revocation endpoint is configured.
    pub async fn revoke_raw(&self, form_body: String) -> Result<(u16, String)> {
        let endpoint = self
            .revocation_endpoint
            .as_deref()
            .ok_or_else(|| Error::TokenExchange("no revocation endpoint configured".into()))?;

        let response = self
            .http
            .post(endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose()))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(form_body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("revocation request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}
