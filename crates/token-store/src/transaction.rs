//! In-flight authorization transactions with TTL sweep
//!
//! One transaction per authorization attempt, keyed by a server-generated
//! id. Entries progress from created (`/authorize`) through upstream-
//! authorized (`/callback` attaches tokens and a single-use code) to
//! consumed (`/token` removes the entry) — or they are collected by the
//! periodic sweep once older than the TTL, whatever state they are in.
//!
//! The single mutex makes every operation atomic with respect to the
//! others; the sweep racing a handler can at worst remove an entry the
//! handler was about to remove, which both sides treat as "absent".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use spotify_auth::UpstreamTokens;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How long an unfinished transaction may live before the sweep takes it.
pub const TRANSACTION_TTL: Duration = Duration::from_secs(600);

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One in-flight authorization attempt.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Server-generated primary key, never client-controlled
    pub id: String,
    /// Opaque value echoed back to the client unchanged
    pub client_state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    /// Resource indicator, opaque at this layer
    pub resource: Option<String>,
    /// Non-owning reference into the session store
    pub session_id: Option<String>,
    /// The client's requested redirect target; validated at redirect time,
    /// not at creation
    pub client_redirect_uri: Option<String>,
    /// Absent until the upstream callback completes
    pub upstream_tokens: Option<UpstreamTokens>,
    /// Set exactly once by the callback, consumed by the token exchange
    pub single_use_code: Option<String>,
    pub created_at: Instant,
}

impl Transaction {
    /// A fresh transaction as created by `/authorize`.
    pub fn new(
        client_state: String,
        code_challenge: String,
        code_challenge_method: String,
        resource: Option<String>,
        session_id: Option<String>,
        client_redirect_uri: Option<String>,
    ) -> Self {
        Self {
            id: format!("txn_{}", uuid::Uuid::new_v4().as_simple()),
            client_state,
            code_challenge,
            code_challenge_method,
            resource,
            session_id,
            client_redirect_uri,
            upstream_tokens: None,
            single_use_code: None,
            created_at: Instant::now(),
        }
    }
}

/// Keyed, time-bounded storage for in-flight authorization attempts.
pub struct TransactionStore {
    state: Mutex<HashMap<String, Transaction>>,
    ttl: Duration,
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new(TRANSACTION_TTL)
    }
}

impl TransactionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert a transaction, keyed by its own id.
    pub async fn insert(&self, txn: Transaction) {
        let mut state = self.state.lock().await;
        debug!(txn_id = txn.id, "transaction created");
        state.insert(txn.id.clone(), txn);
    }

    /// Clone out a transaction by id. Absence is `None`, never an error.
    pub async fn get(&self, id: &str) -> Option<Transaction> {
        let state = self.state.lock().await;
        state.get(id).cloned()
    }

    /// Find the transaction holding a given single-use code.
    ///
    /// Linear scan — flows are low-cardinality and short-lived, so an
    /// index by code would buy nothing observable.
    pub async fn find_by_code(&self, code: &str) -> Option<Transaction> {
        let state = self.state.lock().await;
        state
            .values()
            .find(|txn| txn.single_use_code.as_deref() == Some(code))
            .cloned()
    }

    /// Apply a mutation to a stored transaction under the lock.
    /// Returns false if the transaction no longer exists.
    pub async fn update<F>(&self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut Transaction),
    {
        let mut state = self.state.lock().await;
        match state.get_mut(id) {
            Some(txn) => {
                mutate(txn);
                true
            }
            None => false,
        }
    }

    /// Remove a transaction. Returns the removed entry; `None` when it was
    /// already gone, which makes consumption first-wins — the single-use
    /// guarantee hangs on this.
    pub async fn remove(&self, id: &str) -> Option<Transaction> {
        let mut state = self.state.lock().await;
        state.remove(id)
    }

    /// Drop every transaction older than the TTL, regardless of state.
    /// Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut state = self.state.lock().await;
        let before = state.len();
        let ttl = self.ttl;
        state.retain(|_, txn| txn.created_at.elapsed() < ttl);
        let removed = before - state.len();
        if removed > 0 {
            info!(removed, "swept expired transactions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Spawn the background sweep that collects abandoned flows.
///
/// Runs every `interval`; the TTL belongs to the store itself. The first
/// immediate tick is skipped — nothing can have expired at process start.
pub fn spawn_sweep_task(
    store: Arc<TransactionStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            store.sweep().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn() -> Transaction {
        Transaction::new(
            "client-state".into(),
            "challenge".into(),
            "S256".into(),
            None,
            Some("session-1".into()),
            Some("http://127.0.0.1:9/cb".into()),
        )
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = TransactionStore::default();
        let t = txn();
        let id = t.id.clone();
        store.insert(t).await;

        let got = store.get(&id).await.unwrap();
        assert_eq!(got.id, id);
        assert_eq!(got.client_state, "client-state");
        assert!(got.upstream_tokens.is_none());
        assert!(got.single_use_code.is_none());
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = TransactionStore::default();
        assert!(store.get("txn_missing").await.is_none());
    }

    #[tokio::test]
    async fn ids_are_server_generated_and_unique() {
        let a = txn();
        let b = txn();
        assert!(a.id.starts_with("txn_"));
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_mutates_in_place() {
        let store = TransactionStore::default();
        let t = txn();
        let id = t.id.clone();
        store.insert(t).await;

        let updated = store
            .update(&id, |t| {
                t.single_use_code = Some("code_abc".into());
            })
            .await;
        assert!(updated);
        assert_eq!(
            store.get(&id).await.unwrap().single_use_code.as_deref(),
            Some("code_abc")
        );
    }

    #[tokio::test]
    async fn update_missing_returns_false() {
        let store = TransactionStore::default();
        assert!(!store.update("txn_gone", |_| {}).await);
    }

    #[tokio::test]
    async fn find_by_code_scans_live_transactions() {
        let store = TransactionStore::default();
        let mut t = txn();
        t.single_use_code = Some("code_xyz".into());
        let id = t.id.clone();
        store.insert(t).await;
        store.insert(txn()).await;

        let found = store.find_by_code("code_xyz").await.unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_by_code("code_other").await.is_none());
    }

    #[tokio::test]
    async fn remove_is_first_wins() {
        let store = TransactionStore::default();
        let t = txn();
        let id = t.id.clone();
        store.insert(t).await;

        assert!(store.remove(&id).await.is_some());
        assert!(store.remove(&id).await.is_none(), "second removal is a miss");
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let store = TransactionStore::new(Duration::from_millis(50));
        let old = txn();
        let old_id = old.id.clone();
        store.insert(old).await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        let fresh = txn();
        let fresh_id = fresh.id.clone();
        store.insert(fresh).await;

        let removed = store.sweep().await;
        assert_eq!(removed, 1);
        assert!(store.get(&old_id).await.is_none(), "expired entry swept");
        assert!(store.get(&fresh_id).await.is_some(), "fresh entry kept");
    }

    #[tokio::test]
    async fn sweep_before_ttl_keeps_everything() {
        let store = TransactionStore::new(Duration::from_secs(600));
        store.insert(txn()).await;
        assert_eq!(store.sweep().await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sweep_takes_completed_but_unconsumed_flows_too() {
        // A callback-completed transaction whose code was never exchanged
        // still expires — TTL applies regardless of state.
        let store = TransactionStore::new(Duration::from_millis(30));
        let mut t = txn();
        t.single_use_code = Some("code_unclaimed".into());
        store.insert(t).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.sweep().await, 1);
        assert!(store.find_by_code("code_unclaimed").await.is_none());
    }

    #[tokio::test]
    async fn sweep_task_runs_on_interval() {
        let store = Arc::new(TransactionStore::new(Duration::from_millis(20)));
        store.insert(txn()).await;

        let handle = spawn_sweep_task(store.clone(), Duration::from_millis(40));
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        assert!(store.is_empty().await, "background sweep must collect expired flows");
    }

    #[tokio::test]
    async fn concurrent_inserts_do_not_lose_entries() {
        let store = Arc::new(TransactionStore::default());
        let mut handles = vec![];
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(txn()).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len().await, 10);
    }
}
