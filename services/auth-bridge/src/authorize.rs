//! `/authorize` — client-facing entry point of the bridge flow
//!
//! Validates the client's PKCE parameters, records a transaction, seals
//! the composite state, and redirects the browser to the upstream
//! provider's authorize endpoint as a confidential client (the client's
//! PKCE material stays here and is never forwarded upstream).

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use spotify_auth::{CODE_CHALLENGE_METHOD, StateSnapshot, generate_client_state};
use token_store::Transaction;
use tracing::{debug, info, warn};
use url::Url;

use crate::AppState;
use crate::error::OAuthError;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub redirect_uri: Option<String>,
    pub resource: Option<String>,
    /// Client-declared session identifier, links this flow to prior ones
    pub sid: Option<String>,
}

pub async fn authorize(
    State(app): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    // PKCE is mandatory and S256-only; plain would defeat the point
    let challenge = match query.code_challenge.as_deref() {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => {
            warn!("authorize request without code_challenge");
            return OAuthError::InvalidCodeChallenge("code_challenge is required".into())
                .into_response();
        }
    };
    if query.code_challenge_method.as_deref() != Some(CODE_CHALLENGE_METHOD) {
        warn!(
            method = query.code_challenge_method.as_deref().unwrap_or("<absent>"),
            "authorize request with unsupported challenge method"
        );
        return OAuthError::InvalidCodeChallenge("only S256 is supported".into()).into_response();
    }

    // A client that sent no state still needs one to correlate the
    // callback; mint an opaque value on its behalf
    let client_state = match query.state {
        Some(s) if !s.is_empty() => s,
        _ => generate_client_state(),
    };

    if let Some(ref sid) = query.sid {
        app.sessions.ensure(sid).await;
    }

    let txn = Transaction::new(
        client_state,
        challenge,
        CODE_CHALLENGE_METHOD.to_string(),
        query.resource,
        query.sid,
        query.redirect_uri,
    );

    let snapshot = StateSnapshot {
        txn_id: txn.id.clone(),
        session_id: txn.session_id.clone(),
        client_state: txn.client_state.clone(),
        client_redirect_uri: txn.client_redirect_uri.clone(),
        code_challenge: txn.code_challenge.clone(),
        code_challenge_method: txn.code_challenge_method.clone(),
        resource: txn.resource.clone(),
    };
    let sealed = match spotify_auth::seal(&snapshot, &app.state_key) {
        Ok(sealed) => sealed,
        Err(e) => {
            warn!(error = %e, "failed to seal state snapshot");
            return OAuthError::ServerError("state sealing failed".into()).into_response();
        }
    };

    let upstream_url = match Url::parse(&app.config.upstream.authorize_endpoint) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("client_id", &app.config.upstream.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &app.config.callback_url())
                .append_pair("scope", &app.config.upstream.scopes)
                .append_pair("state", &sealed);
            url
        }
        Err(e) => {
            warn!(error = %e, "configured authorize endpoint is not a valid URL");
            return OAuthError::ServerError("bad upstream authorize endpoint".into())
                .into_response();
        }
    };

    let txn_id = txn.id.clone();
    app.transactions.insert(txn).await;
    metrics::record_flow_started();

    info!(txn_id, "authorization flow started, redirecting upstream");
    debug!(upstream = %upstream_url, "upstream authorize URL");
    Redirect::to(upstream_url.as_str()).into_response()
}
