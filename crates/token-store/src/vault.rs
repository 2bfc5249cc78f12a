//! Token vault: opaque RS tokens mapped to upstream token sets
//!
//! One record per issued RS refresh token. The refresh token is the
//! record's stable primary key for its whole lifetime; the access token
//! rotates on every refresh grant and prior access tokens are implicitly
//! superseded. Records live for the process lifetime; there is no
//! deletion path.
//!
//! `refresh_and_rotate` follows the read-check-call-update sequence: the
//! record is cloned out under the lock, the upstream refresh (if needed)
//! happens with no lock held, and the result is written back afterwards.

use std::collections::HashMap;

use spotify_auth::{UpstreamClient, UpstreamTokens, now_millis};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// RS access token lifetime reported to clients via `expires_in`.
pub const RS_ACCESS_TTL_SECS: u64 = 3600;

/// Safety margin before upstream expiry that triggers an upstream refresh.
pub const REFRESH_MARGIN_MILLIS: u64 = 30_000;

/// One issued RS token pair and the upstream token set backing it.
#[derive(Debug, Clone)]
pub struct VaultRecord {
    /// Current opaque bearer token; rotates on refresh
    pub access_token: String,
    /// Opaque, stable primary key for the record
    pub refresh_token: String,
    /// Mirror of the upstream token set, refreshed in place when stale
    pub upstream: UpstreamTokens,
}

fn mint(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().as_simple())
}

/// Keyed storage for vault records, keyed by RS refresh token.
#[derive(Default)]
pub struct TokenVault {
    state: Mutex<HashMap<String, VaultRecord>>,
}

impl TokenVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh RS access/refresh pair backed by `upstream` and
    /// persist the record.
    pub async fn store(&self, upstream: UpstreamTokens) -> VaultRecord {
        let record = VaultRecord {
            access_token: mint("rsa_"),
            refresh_token: mint("rsr_"),
            upstream,
        };
        let mut state = self.state.lock().await;
        state.insert(record.refresh_token.clone(), record.clone());
        debug!(refresh_token = %record.refresh_token, "vault record created");
        record
    }

    /// Clone out a record by RS refresh token.
    pub async fn find(&self, rs_refresh_token: &str) -> Option<VaultRecord> {
        let state = self.state.lock().await;
        state.get(rs_refresh_token).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Refresh-rotation for a refresh_token grant.
    ///
    /// Ensures the mirrored upstream token is fresh (refreshing upstream
    /// only when expiry is unknown or within [`REFRESH_MARGIN_MILLIS`]),
    /// then mints a new RS access token while keeping the RS refresh token
    /// stable. Upstream rejection of the credential is `RefreshRejected`
    /// (the grant fails, no silent retry); transport failures are
    /// `RefreshTransport` (the caller may retry).
    pub async fn refresh_and_rotate(
        &self,
        upstream_client: &UpstreamClient,
        rs_refresh_token: &str,
    ) -> Result<VaultRecord> {
        let record = self
            .find(rs_refresh_token)
            .await
            .ok_or_else(|| Error::NotFound(rs_refresh_token.to_string()))?;

        let now = now_millis();
        let refreshed = if record.upstream.expires_within(REFRESH_MARGIN_MILLIS, now) {
            let refresh_token = record.upstream.refresh_token.clone().ok_or_else(|| {
                Error::RefreshRejected("no upstream refresh token on record".into())
            })?;

            debug!(
                refresh_token = %rs_refresh_token,
                "upstream token stale, refreshing"
            );
            // No store lock is held here — the upstream call may suspend
            match upstream_client.refresh(&refresh_token).await {
                Ok(response) => {
                    let mut fresh = UpstreamTokens::from_response(response, now_millis());
                    // Providers may omit the refresh token on refresh
                    // responses; keep the one we have
                    if fresh.refresh_token.is_none() {
                        fresh.refresh_token = Some(refresh_token);
                    }
                    if fresh.scope.is_empty() {
                        fresh.scope = record.upstream.scope.clone();
                    }
                    info!(refresh_token = %rs_refresh_token, "upstream token refreshed");
                    Some(fresh)
                }
                Err(spotify_auth::Error::InvalidCredentials(msg)) => {
                    warn!(refresh_token = %rs_refresh_token, error = %msg, "upstream rejected refresh");
                    return Err(Error::RefreshRejected(msg));
                }
                Err(e) => {
                    warn!(refresh_token = %rs_refresh_token, error = %e, "upstream refresh failed");
                    return Err(Error::RefreshTransport(e.to_string()));
                }
            }
        } else {
            None
        };

        let mut state = self.state.lock().await;
        let stored = state
            .get_mut(rs_refresh_token)
            .ok_or_else(|| Error::NotFound(rs_refresh_token.to_string()))?;
        if let Some(fresh) = refreshed {
            stored.upstream = fresh;
        }
        stored.access_token = mint("rsa_");
        Ok(stored.clone())
    }
}
