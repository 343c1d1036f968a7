use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};

/// How long an open scan session stays valid after the rack scan.
pub const SESSION_TTL_SECS: u64 = 300;
const SWEEP_INTERVAL_SECS: u64 = 30;

/// An open rack-scan session awaiting item scans.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub session_id: String,
    pub location_id: String,
    pub opened_at: DateTime<Utc>,
    created: Instant,
}

/// In-memory store of open scan sessions. Sessions live until their TTL
/// elapses or the store is shut down; a background sweeper evicts stale
/// entries so abandoned sessions do not accumulate.
pub struct ScanSessionStore {
    sessions: Arc<Mutex<HashMap<String, ScanSession>>>,
    ttl: Duration,
    cancel: CancellationToken,
}

impl ScanSessionStore {
    /// Must be called from within a tokio runtime: the sweeper task is
    /// spawned immediately.
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(SESSION_TTL_SECS))
    }

    /// Store with a custom TTL. Used by tests to exercise expiry quickly.
    /// Same runtime requirement as [`ScanSessionStore::new`].
    pub fn with_ttl(ttl: Duration) -> Self {
        let sessions: Arc<Mutex<HashMap<String, ScanSession>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let sweep_sessions = sessions.clone();
        let sweep_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = sweep_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut sessions = sweep_sessions.lock().await;
                        let before = sessions.len();
                        sessions.retain(|_, session| session.created.elapsed() <= ttl);
                        let evicted = before - sessions.len();
                        if evicted > 0 {
                            debug!("Evicted {evicted} expired scan sessions");
                        }
                    }
                }
            }
            info!("Scan session sweeper stopped");
        });

        Self {
            sessions,
            ttl,
            cancel,
        }
    }

    /// Open a session for a rack location and return its id.
    pub async fn open(&self, location_id: &str) -> ScanSession {
        let session = ScanSession {
            session_id: Uuid::new_v4().to_string(),
            location_id: location_id.to_string(),
            opened_at: Utc::now(),
            created: Instant::now(),
        };
        self.sessions
            .lock()
            .await
            .insert(session.session_id.clone(), session.clone());
        session
    }

    /// Look up a session by id. Unknown ids and expired sessions are
    /// distinct errors so the client knows whether to rescan the rack.
    /// Expired entries are removed on sight.
    pub async fn resolve(&self, session_id: &str) -> Result<ScanSession> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(session_id) {
            None => Err(Error::SessionRequired),
            Some(session) if session.created.elapsed() > self.ttl => {
                sessions.remove(session_id);
                Err(Error::SessionExpired)
            }
            Some(session) => Ok(session.clone()),
        }
    }

    /// Drop a session, e.g. when the rack scan failed to persist its audit row.
    pub async fn discard(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Default for ScanSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScanSessionStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_requires_rack_scan() {
        let store = ScanSessionStore::new();
        let err = store.resolve("no-such-session").await.unwrap_err();
        assert!(matches!(err, Error::SessionRequired));
    }

    #[tokio::test]
    async fn session_is_reusable_until_ttl() {
        let store = ScanSessionStore::new();
        let session = store.open("RACK-01").await;

        for _ in 0..2 {
            let resolved = store.resolve(&session.session_id).await.unwrap();
            assert_eq!(resolved.location_id, "RACK-01");
        }
    }

    #[tokio::test]
    async fn expired_session_is_removed_on_resolve() {
        let store = ScanSessionStore::with_ttl(Duration::from_millis(20));
        let session = store.open("RACK-01").await;

        tokio::time::sleep(Duration::from_millis(40)).await;

        let err = store.resolve(&session.session_id).await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
        // Second attempt sees the entry gone entirely.
        let err = store.resolve(&session.session_id).await.unwrap_err();
        assert!(matches!(err, Error::SessionRequired));
    }

    #[tokio::test]
    async fn discard_removes_session() {
        let store = ScanSessionStore::new();
        let session = store.open("RACK-01").await;
        store.discard(&session.session_id).await;
        let err = store.resolve(&session.session_id).await.unwrap_err();
        assert!(matches!(err, Error::SessionRequired));
    }
}
