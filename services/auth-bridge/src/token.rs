//! `/token` and `/revoke` — the client-facing token endpoints
//!
//! `/token` accepts either JSON or form-encoded bodies (MCP clients send
//! both in the wild) and supports two grants:
//!
//! - `authorization_code`: verifies the PKCE verifier against the stored
//!   challenge, consumes the single-use code atomically (first caller
//!   wins), and mints an opaque RS token pair from the vault
//! - `refresh_token`: rotates the RS access token, refreshing the
//!   mirrored upstream token first when it is stale
//!
//! `/revoke` is a thin passthrough to the upstream revocation endpoint
//! when one is configured, 501 otherwise.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use token_store::RS_ACCESS_TTL_SECS;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::OAuthError;
use crate::metrics;

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

/// Parse the request body as JSON when the content type says so, as a
/// form otherwise. Unknown fields are ignored in both shapes.
fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<TokenRequest, OAuthError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        serde_json::from_slice(body)
            .map_err(|e| OAuthError::InvalidRequest(format!("bad JSON body: {e}")))
    } else {
        serde_urlencoded::from_bytes(body)
            .map_err(|e| OAuthError::InvalidRequest(format!("bad form body: {e}")))
    }
}

pub async fn token(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, OAuthError> {
    let request = parse_body(&headers, &body)?;

    match request.grant_type.as_deref() {
        Some("authorization_code") => authorization_code_grant(&app, request).await,
        Some("refresh_token") => refresh_token_grant(&app, request).await,
        other => {
            let grant = other.unwrap_or("<absent>").to_string();
            metrics::record_token_grant(&grant, "unsupported");
            Err(OAuthError::UnsupportedGrantType(grant))
        }
    }
}

async fn authorization_code_grant(
    app: &AppState,
    request: TokenRequest,
) -> Result<Response, OAuthError> {
    let fail = |msg: &str| {
        metrics::record_token_grant("authorization_code", "invalid_grant");
        OAuthError::InvalidGrant(msg.into())
    };

    let code = request.code.ok_or_else(|| fail("code is required"))?;
    let verifier = request
        .code_verifier
        .ok_or_else(|| fail("code_verifier is required"))?;

    let txn = app
        .transactions
        .find_by_code(&code)
        .await
        .ok_or_else(|| fail("unknown or expired code"))?;

    // PKCE binding: the verifier must hash to the challenge sent on
    // /authorize. Failure does not consume the code.
    if !spotify_auth::verify_s256(&txn.code_challenge, &verifier) {
        warn!(txn_id = txn.id, "PKCE verification failed");
        return Err(fail("code_verifier does not match"));
    }

    // Session tokens win over the transaction's own copy: a concurrent
    // flow for the same session may hold fresher upstream credentials
    let tokens = match &txn.session_id {
        Some(sid) => app
            .sessions
            .get(sid)
            .await
            .and_then(|s| s.tokens)
            .or_else(|| txn.upstream_tokens.clone()),
        None => txn.upstream_tokens.clone(),
    }
    .ok_or_else(|| fail("authorization not completed upstream"))?;

    // Atomic removal is the single-use guarantee: of two racing
    // exchanges, exactly one gets the entry back
    if app.transactions.remove(&txn.id).await.is_none() {
        warn!(txn_id = txn.id, "code already consumed");
        return Err(fail("code already consumed"));
    }

    let record = app.vault.store(tokens).await;
    info!(txn_id = txn.id, "authorization code exchanged for RS tokens");
    metrics::record_token_grant("authorization_code", "success");

    Ok(token_response(&record))
}

async fn refresh_token_grant(app: &AppState, request: TokenRequest) -> Result<Response, OAuthError> {
    let rs_refresh = request.refresh_token.ok_or_else(|| {
        metrics::record_token_grant("refresh_token", "invalid_grant");
        OAuthError::InvalidGrant("refresh_token is required".into())
    })?;

    match app.vault.refresh_and_rotate(&app.upstream, &rs_refresh).await {
        Ok(record) => {
            debug!("refresh grant rotated RS access token");
            metrics::record_token_grant("refresh_token", "success");
            Ok(token_response(&record))
        }
        Err(token_store::Error::NotFound(_)) => {
            metrics::record_token_grant("refresh_token", "invalid_grant");
            Err(OAuthError::InvalidGrant("unknown refresh token".into()))
        }
        Err(token_store::Error::RefreshRejected(msg)) => {
            metrics::record_token_grant("refresh_token", "invalid_grant");
            metrics::record_upstream_error("refresh_rejected");
            Err(OAuthError::InvalidGrant(msg))
        }
        Err(token_store::Error::RefreshTransport(msg)) => {
            metrics::record_token_grant("refresh_token", "server_error");
            metrics::record_upstream_error("refresh_transport");
            Err(OAuthError::ServerError(msg))
        }
    }
}

fn token_response(record: &token_store::VaultRecord) -> Response {
    axum::Json(serde_json::json!({
        "access_token": record.access_token,
        "refresh_token": record.refresh_token,
        "token_type": "bearer",
        "expires_in": RS_ACCESS_TTL_SECS,
        "scope": record.upstream.scope,
    }))
    .into_response()
}

/// Forward a revocation request verbatim to the upstream endpoint.
/// Upstream status and body pass through unchanged.
pub async fn revoke(State(app): State<AppState>, body: String) -> Result<Response, OAuthError> {
    if app.upstream.revocation_endpoint().is_none() {
        return Err(OAuthError::NotImplemented);
    }

    match app.upstream.revoke_raw(body).await {
        Ok((status, body)) => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Ok((status, body).into_response())
        }
        Err(e) => {
            warn!(error = %e, "upstream revocation failed");
            metrics::record_upstream_error("revocation");
            Err(OAuthError::ServerError("revocation request failed".into()))
        }
    }
}
