//! `/spotify/callback` — the upstream provider redirects here
//!
//! Resolves the originating transaction, trades the upstream code for
//! tokens on the confidential leg, mints the client-facing single-use
//! code, and bounces the browser to the (allow-listed) client redirect
//! target.
//!
//! Transaction resolution is two-path: direct store lookup first, then
//! the sealed state snapshot. The snapshot path makes callbacks survive
//! process restarts and sweep evictions — the transaction is rebuilt
//! from the snapshot alone and the flow continues as if nothing
//! happened.
//!
//! Errors render as plain text. This endpoint faces a browser mid-
//! redirect, not an OAuth client parsing JSON.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use spotify_auth::{UpstreamTokens, now_millis};
use token_store::Transaction;
use tracing::{debug, info, warn};
use url::Url;

use crate::AppState;
use crate::metrics;
use crate::redirect::resolve_redirect;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn callback(State(app): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    if let Some(error) = query.error {
        warn!(error, "upstream provider denied authorization");
        metrics::record_callback("upstream_denied");
        return (
            StatusCode::BAD_GATEWAY,
            format!("upstream authorization failed: {error}"),
        )
            .into_response();
    }

    let (Some(code), Some(state_param)) = (query.code, query.state) else {
        metrics::record_callback("unknown_state");
        return (
            StatusCode::BAD_REQUEST,
            "missing code or state parameter".to_string(),
        )
            .into_response();
    };

    let Some(txn) = resolve_transaction(&app, &state_param).await else {
        warn!("callback with unresolvable state");
        metrics::record_callback("unknown_state");
        return (
            StatusCode::BAD_REQUEST,
            "unknown or expired authorization request".to_string(),
        )
            .into_response();
    };

    // Confidential-client exchange; redirect_uri must be our own callback
    let response = match app.upstream.exchange_code(&code, &app.config.callback_url()).await {
        Ok(response) => response,
        Err(e) => {
            warn!(txn_id = txn.id, error = %e, "upstream code exchange failed");
            metrics::record_upstream_error("exchange");
            metrics::record_callback("exchange_failed");
            return (
                StatusCode::BAD_GATEWAY,
                "upstream token exchange failed".to_string(),
            )
                .into_response();
        }
    };

    let mut tokens = UpstreamTokens::from_response(response, now_millis());

    // Providers may withhold a refresh token on re-authorization; fall
    // back to the one already held by this client's session
    if tokens.refresh_token.is_none()
        && let Some(ref sid) = txn.session_id
        && let Some(session) = app.sessions.get(sid).await
        && let Some(prior) = session.tokens
    {
        debug!(txn_id = txn.id, "no refresh token in exchange, keeping session's prior one");
        tokens.refresh_token = prior.refresh_token;
    }

    let single_use_code = format!("code_{}", uuid::Uuid::new_v4().as_simple());

    let updated = {
        let tokens = tokens.clone();
        let code = single_use_code.clone();
        app.transactions
            .update(&txn.id, move |t| {
                t.upstream_tokens = Some(tokens);
                t.single_use_code = Some(code);
            })
            .await
    };
    if !updated {
        // Swept between resolution and update; reinstate so the pending
        // token exchange still finds it
        let mut revived = txn.clone();
        revived.upstream_tokens = Some(tokens.clone());
        revived.single_use_code = Some(single_use_code.clone());
        revived.created_at = Instant::now();
        app.transactions.insert(revived).await;
    }

    if let Some(ref sid) = txn.session_id {
        app.sessions.update(sid, tokens).await;
    }

    let target = resolve_redirect(
        txn.client_redirect_uri.as_deref(),
        &app.config.redirects.allowed,
        &app.config.redirects.default_uri,
        app.config.redirects.allow_loopback,
    );

    let location = match Url::parse(&target) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("code", &single_use_code)
                .append_pair("state", &txn.client_state);
            url.to_string()
        }
        // default_uri is scheme-validated at config load; unreachable in
        // practice but redirecting without params beats a 500 here
        Err(_) => target,
    };

    info!(txn_id = txn.id, "callback completed, redirecting to client");
    metrics::record_callback("success");
    Redirect::to(&location).into_response()
}

/// Find the transaction a callback belongs to.
///
/// Direct lookup by the raw state value first, then the sealed snapshot:
/// if the snapshot opens and its transaction is still live, use it; if
/// the transaction is gone, rebuild it from the snapshot and continue.
async fn resolve_transaction(app: &AppState, state_param: &str) -> Option<Transaction> {
    if let Some(txn) = app.transactions.get(state_param).await {
        return Some(txn);
    }

    let snapshot = spotify_auth::open(state_param, &app.state_key)?;
    if let Some(txn) = app.transactions.get(&snapshot.txn_id).await {
        return Some(txn);
    }

    info!(txn_id = snapshot.txn_id, "rebuilding transaction from sealed state");
    let txn = Transaction {
        id: snapshot.txn_id,
        client_state: snapshot.client_state,
        code_challenge: snapshot.code_challenge,
        code_challenge_method: snapshot.code_challenge_method,
        resource: snapshot.resource,
        session_id: snapshot.session_id,
        client_redirect_uri: snapshot.client_redirect_uri,
        upstream_tokens: None,
        single_use_code: None,
        created_at: Instant::now(),
    };
    app.transactions.insert(txn.clone()).await;
    Some(txn)
}
