//! Long-lived sessions spanning multiple authorization attempts
//!
//! A session maps a client-declared identifier to the most recent upstream
//! token set written by any completed callback for that id. Sessions are
//! lazily created, never deleted by the bridge, and only their token
//! payload mutates. Concurrent callbacks for the same session id resolve
//! last-write-wins, which is sound because upstream tokens are
//! monotonically refreshed.

use std::collections::HashMap;

use spotify_auth::UpstreamTokens;
use tokio::sync::Mutex;
use tracing::debug;

/// One client session. `tokens` is `None` until the first callback
/// completes for this session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub tokens: Option<UpstreamTokens>,
}

/// Keyed storage for sessions. Get-or-create plus token update; no
/// deletion path exists by design.
#[derive(Default)]
pub struct SessionStore {
    state: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for `id`, creating it with an empty token set on
    /// first reference.
    pub async fn ensure(&self, id: &str) -> Session {
        let mut state = self.state.lock().await;
        state
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(session_id = id, "session created");
                Session {
                    id: id.to_string(),
                    tokens: None,
                }
            })
            .clone()
    }

    /// Clone out a session without creating it.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let state = self.state.lock().await;
        state.get(id).cloned()
    }

    /// Overwrite the session's token payload, creating the session if a
    /// callback lands before any `ensure`.
    pub async fn update(&self, id: &str, tokens: UpstreamTokens) {
        let mut state = self.state.lock().await;
        state
            .entry(id.to_string())
            .and_modify(|s| s.tokens = Some(tokens.clone()))
            .or_insert_with(|| Session {
                id: id.to_string(),
                tokens: Some(tokens),
            });
        debug!(session_id = id, "session tokens updated");
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }
}
