//! In-memory session storage keyed by thread id.
//!
//! Sessions survive for the lifetime of the process only. A background
//! sweep evicts entries whose last activity is older than the expiry
//! threshold.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sandbox_relay_core::session::{now_ms, Session, ThreadId};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

/// Sessions idle for at least this long are evicted (24 hours).
pub const SESSION_EXPIRY_MS: i64 = 24 * 60 * 60 * 1000;

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Thread-to-session map shared across message handlers.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ThreadId, Session>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, replacing any existing entry for the same thread.
    pub async fn create(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.thread_id.clone(), session);
    }

    /// Look up the session bound to `thread_id`, if any.
    pub async fn get(&self, thread_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(thread_id).cloned()
    }

    /// Mark the session as active now. Returns `false` when no session is
    /// bound to `thread_id`.
    pub async fn touch(&self, thread_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(thread_id) {
            Some(session) => {
                session.last_activity = now_ms();
                true
            }
            None => false,
        }
    }

    /// Remove every session idle for at least `threshold_ms` as of `now`,
    /// returning how many were evicted.
    pub async fn sweep_expired(&self, now: i64, threshold_ms: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_activity < threshold_ms);
        before - sessions.len()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are tracked.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Spawn the hourly expiry sweep for `store`.
///
/// The task runs until it is aborted or the process exits; dropping the
/// returned handle detaches it.
pub fn spawn_expiry_sweep(store: Arc<SessionStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick fires immediately; skip it so sweeps start one
        // interval after boot.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep_expired(now_ms(), SESSION_EXPIRY_MS).await;
            if removed > 0 {
                info!(removed, "evicted expired sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(thread_id: &str, session_id: &str) -> Session {
        Session::new(thread_id, session_id, "box-1")
    }

    #[tokio::test]
    async fn create_then_get_returns_the_session() {
        let store = SessionStore::new();
        store.create(session("thread-1", "sess-1")).await;

        let found = store.get("thread-1").await.unwrap();
        assert_eq!(found.session_id, "sess-1");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_unknown_thread_returns_none() {
        let store = SessionStore::new();
        assert!(store.get("thread-1").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn create_replaces_existing_binding() {
        let store = SessionStore::new();
        store.create(session("thread-1", "sess-1")).await;
        store.create(session("thread-1", "sess-2")).await;

        let found = store.get("thread-1").await.unwrap();
        assert_eq!(found.session_id, "sess-2");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn touch_advances_last_activity() {
        let store = SessionStore::new();
        let mut stale = session("thread-1", "sess-1");
        stale.last_activity = 5;
        store.create(stale).await;

        assert!(store.touch("thread-1").await);
        let found = store.get("thread-1").await.unwrap();
        assert!(found.last_activity > 5);
    }

    #[tokio::test]
    async fn touch_unknown_thread_returns_false() {
        let store = SessionStore::new();
        assert!(!store.touch("thread-1").await);
    }

    #[tokio::test]
    async fn sweep_evicts_only_idle_sessions() {
        let store = SessionStore::new();
        let mut idle = session("thread-1", "sess-1");
        idle.last_activity = 0;
        let mut fresh = session("thread-2", "sess-2");
        fresh.last_activity = 900;
        store.create(idle).await;
        store.create(fresh).await;

        let removed = store.sweep_expired(1000, 1000).await;
        assert_eq!(removed, 1);
        assert!(store.get("thread-1").await.is_none());
        assert!(store.get("thread-2").await.is_some());

        // A second sweep with the same clock removes nothing further.
        assert_eq!(store.sweep_expired(1000, 1000).await, 0);
    }

    #[tokio::test]
    async fn sweep_threshold_is_inclusive() {
        let store = SessionStore::new();
        let mut boundary = session("thread-1", "sess-1");
        boundary.last_activity = 0;
        store.create(boundary).await;

        // Exactly at the threshold counts as expired.
        assert_eq!(store.sweep_expired(1000, 1000).await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_with_nothing_expired_removes_nothing() {
        let store = SessionStore::new();
        store.create(session("thread-1", "sess-1")).await;

        assert_eq!(store.sweep_expired(now_ms(), SESSION_EXPIRY_MS).await, 0);
        assert_eq!(store.len().await, 1);
    }
}
