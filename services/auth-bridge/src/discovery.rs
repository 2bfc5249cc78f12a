//! OAuth discovery documents and the registration stub
//!
//! Both well-known documents advertise this service as the authorization
//! server — clients must never discover the upstream provider directly,
//! or they would try PKCE against an endpoint that requires a client
//! secret.
//!
//! `/register` exists because some clients insist on dynamic client
//! registration before starting a flow. The bridge does not track
//! clients, so it hands out a fresh id and echoes the redirect URIs
//! back; the real gate is the redirect allow-list at callback time.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::debug;

use crate::AppState;

fn metadata(app: &AppState) -> serde_json::Value {
    let issuer = &app.config.server.public_url;
    let mut doc = serde_json::json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/token"),
        "registration_endpoint": format!("{issuer}/register"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "token_endpoint_auth_methods_supported": ["none"],
        "scopes_supported": app.config.upstream.scopes.split(' ').collect::<Vec<_>>(),
    });
    if app.config.upstream.revocation_endpoint.is_some() {
        doc["revocation_endpoint"] = serde_json::json!(format!("{issuer}/revoke"));
    }
    doc
}

pub async fn authorization_server_metadata(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(metadata(&app))
}

/// Same document under the OIDC name; some clients only probe this path.
pub async fn openid_configuration(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(metadata(&app))
}

#[derive(Debug, Default, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    redirect_uris: Vec<String>,
}

/// Dynamic client registration stub. Tolerant of any body — a malformed
/// request still gets a registration, since nothing is stored either way.
pub async fn register(State(app): State<AppState>, body: Bytes) -> Response {
    let request: RegisterRequest = serde_json::from_slice(&body).unwrap_or_default();

    let redirect_uris = if request.redirect_uris.is_empty() {
        vec![app.config.redirects.default_uri.clone()]
    } else {
        request.redirect_uris
    };

    let client_id = format!("client_{}", uuid::Uuid::new_v4().as_simple());
    debug!(client_id, "registration stub issued a client id");

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "client_id": client_id,
            "redirect_uris": redirect_uris,
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "token_endpoint_auth_method": "none",
        })),
    )
        .into_response()
}
