//! Session entity operations.
//!
//! Sessions live only in the expiring cache under `session:{chat_id}`.
//! Writes for one chat are serialized through a per-chat async lock, and
//! every write also checks the stored revision so a caller holding an old
//! copy cannot overwrite newer state.

use std::sync::Arc;
use std::time::Duration;

use chatgm_domain::serialization::{decode_session, encode_session};
use chatgm_domain::{self as domain, DomainError, ErrorCode, SessionId, SessionState};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::infrastructure::ports::{CacheError, CachePort, ClockPort};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Session for chat {chat_id} changed concurrently (expected revision {expected}, found {found})")]
    StaleRevision {
        chat_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Session {session_id} for chat {chat_id} expired or was replaced")]
    Expired { chat_id: String, session_id: SessionId },

    #[error("Session cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Session serialization error: {0}")]
    Serialization(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<DomainError> for SessionError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidStateTransition { from, to } => Self::InvalidTransition { from, to },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::StaleRevision { .. } | Self::Expired { .. } => "stale_revision",
            Self::Cache(e) => e.code(),
            Self::Serialization(_) => "cache_error",
            Self::Validation(_) => "validation_error",
        }
    }
}

fn cache_key(chat_id: &str) -> String {
    format!("session:{chat_id}")
}

/// Session entity operations.
pub struct Session {
    cache: Arc<dyn CachePort>,
    clock: Arc<dyn ClockPort>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    idle_timeout: Duration,
}

impl Session {
    pub fn new(cache: Arc<dyn CachePort>, clock: Arc<dyn ClockPort>, idle_timeout: Duration) -> Self {
        Self {
            cache,
            clock,
            locks: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// The cached session for `chat_id`, or a new `Inactive` one which is
    /// stored before it is returned.
    pub async fn get_or_create(&self, chat_id: &str) -> Result<domain::Session, SessionError> {
        let lock = self.lock_for(chat_id);
        let _guard = lock.lock().await;
        self.load_or_create(chat_id).await
    }

    /// Write `session` back and restart its expiry.
    ///
    /// Fails with `StaleRevision` when the cached copy has moved past the
    /// revision `session` was read at, and with `Expired` when the session
    /// it was read from is no longer the one cached for its chat.
    pub async fn save(&self, session: &mut domain::Session) -> Result<(), SessionError> {
        let lock = self.lock_for(session.chat_id());
        let _guard = lock.lock().await;
        self.store(session).await
    }

    /// Read-modify-write the session for `chat_id` under its lock.
    ///
    /// When `change` fails nothing is written.
    pub async fn update<T, F>(&self, chat_id: &str, change: F) -> Result<(domain::Session, T), SessionError>
    where
        F: FnOnce(&mut domain::Session) -> Result<T, SessionError> + Send,
        T: Send,
    {
        let lock = self.lock_for(chat_id);
        let _guard = lock.lock().await;

        let mut session = self.load_or_create(chat_id).await?;
        let outcome = change(&mut session)?;
        self.store(&mut session).await?;
        Ok((session, outcome))
    }

    /// Move the session along the state graph. Edges into or out of
    /// `WaitingOnHuman` go through `escalate` and `resume`.
    pub async fn transition(&self, chat_id: &str, target: SessionState) -> Result<domain::Session, SessionError> {
        let (session, from) = self
            .update(chat_id, |session| {
                let from = session.state();
                session.transition(target)?;
                Ok(from)
            })
            .await?;
        tracing::info!(chat_id = %chat_id, from = %from, to = %target, "Session transitioned");
        Ok(session)
    }

    /// Hand the session to a human. Returns the session and the state it left.
    pub async fn escalate(&self, chat_id: &str) -> Result<(domain::Session, SessionState), SessionError> {
        let (session, previous) = self.update(chat_id, |session| Ok(session.escalate()?)).await?;
        tracing::info!(chat_id = %chat_id, previous = %previous, "Session waiting on human");
        Ok((session, previous))
    }

    /// Return a session waiting on a human to `Active`.
    pub async fn resume(&self, chat_id: &str) -> Result<domain::Session, SessionError> {
        let (session, _) = self
            .update(chat_id, |session| Ok(session.resume_from_human()?))
            .await?;
        tracing::info!(chat_id = %chat_id, "Session resumed from human control");
        Ok(session)
    }

    /// Drop expired cache entries and locks nobody holds.
    pub async fn sweep_expired(&self) -> Result<usize, SessionError> {
        let removed = self.cache.sweep().await?;
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        if removed > 0 {
            tracing::debug!(removed, "Expired sessions swept");
        }
        Ok(removed)
    }

    // =========================================================================
    // Internals (callers hold the chat lock)
    // =========================================================================

    fn lock_for(&self, chat_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, chat_id: &str) -> Result<Option<domain::Session>, SessionError> {
        let Some(raw) = self.cache.get(&cache_key(chat_id)).await? else {
            return Ok(None);
        };
        match decode_session(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Discarding unreadable cached session");
                Ok(None)
            }
        }
    }

    async fn load_or_create(&self, chat_id: &str) -> Result<domain::Session, SessionError> {
        if let Some(session) = self.load(chat_id).await? {
            return Ok(session);
        }
        let mut session = domain::Session::new(SessionId::new(), chat_id, self.clock.now());
        self.store(&mut session).await?;
        tracing::info!(chat_id = %chat_id, session_id = %session.id(), "Session created");
        Ok(session)
    }

    async fn store(&self, session: &mut domain::Session) -> Result<(), SessionError> {
        let chat_id = session.chat_id().to_string();
        match self.load(&chat_id).await? {
            Some(current) if current.id() != session.id() => {
                return Err(SessionError::Expired {
                    chat_id,
                    session_id: session.id(),
                });
            }
            Some(current) if current.revision() != session.revision() => {
                return Err(SessionError::StaleRevision {
                    chat_id,
                    expected: session.revision(),
                    found: current.revision(),
                });
            }
            // Revision 0 has never been stored; anything else outlived its entry.
            None if session.revision() > 0 => {
                return Err(SessionError::Expired {
                    chat_id,
                    session_id: session.id(),
                });
            }
            _ => {}
        }

        session.set_revision(session.revision() + 1);
        let raw = match encode_session(session) {
            Ok(raw) => raw,
            Err(e) => {
                session.set_revision(session.revision() - 1);
                return Err(SessionError::Serialization(e.to_string()));
            }
        };
        if let Err(e) = self.cache.set(&cache_key(&chat_id), raw, self.idle_timeout).await {
            session.set_revision(session.revision() - 1);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::TtlCache;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::ports::MockCachePort;
    use chrono::{TimeZone, Utc};

    const TTL: Duration = Duration::from_secs(1800);

    fn sessions() -> (Session, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 2, 20, 0, 0).unwrap()));
        let cache: Arc<TtlCache<String, String>> = Arc::new(TtlCache::new(clock.clone()));
        (Session::new(cache, clock.clone(), TTL), clock)
    }

    #[tokio::test]
    async fn get_or_create_returns_same_session() {
        let (store, _) = sessions();
        let first = store.get_or_create("chat-1").await.unwrap();
        let second = store.get_or_create("chat-1").await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(first.state(), SessionState::Inactive);
        assert_eq!(second.world_state().location(), Some("The Golden Dragon Tavern"));
    }

    #[tokio::test]
    async fn fetch_reflects_latest_save() {
        let (store, _) = sessions();
        let mut session = store.get_or_create("chat-1").await.unwrap();
        session.join("alice");
        store.save(&mut session).await.unwrap();

        let fetched = store.get_or_create("chat-1").await.unwrap();
        assert!(fetched.has_player("alice"));
        assert_eq!(fetched.revision(), session.revision());
    }

    #[tokio::test]
    async fn save_from_old_copy_is_rejected() {
        let (store, _) = sessions();
        let mut first = store.get_or_create("chat-1").await.unwrap();
        let mut second = first.clone();

        first.join("alice");
        store.save(&mut first).await.unwrap();
        second.join("bob");
        let err = store.save(&mut second).await.unwrap_err();
        assert_eq!(err.code(), "stale_revision");

        let fetched = store.get_or_create("chat-1").await.unwrap();
        assert!(fetched.has_player("alice"));
        assert!(!fetched.has_player("bob"));
    }

    #[tokio::test]
    async fn expired_session_is_replaced() {
        let (store, clock) = sessions();
        let old = store.get_or_create("chat-1").await.unwrap();
        store.transition("chat-1", SessionState::Active).await.unwrap();

        clock.advance(chrono::Duration::seconds(1801));
        let fresh = store.get_or_create("chat-1").await.unwrap();
        assert_ne!(fresh.id(), old.id());
        assert_eq!(fresh.state(), SessionState::Inactive);
    }

    #[tokio::test]
    async fn save_from_expired_copy_does_not_replace_new_session() {
        let (store, clock) = sessions();
        let mut old = store.get_or_create("chat-1").await.unwrap();

        clock.advance(chrono::Duration::seconds(1801));
        let (fresh, _) = store.update("chat-1", |s| Ok(s.join("bob"))).await.unwrap();
        assert_ne!(fresh.id(), old.id());

        old.join("alice");
        let err = store.save(&mut old).await.unwrap_err();
        assert!(matches!(err, SessionError::Expired { session_id, .. } if session_id == old.id()));
        assert_eq!(err.code(), "stale_revision");

        let cached = store.get_or_create("chat-1").await.unwrap();
        assert_eq!(cached.id(), fresh.id());
        assert!(cached.has_player("bob"));
        assert!(!cached.has_player("alice"));
    }

    #[tokio::test]
    async fn save_after_expiry_does_not_revive_session() {
        let (store, clock) = sessions();
        let mut old = store.get_or_create("chat-1").await.unwrap();

        clock.advance(chrono::Duration::seconds(1801));
        store.sweep_expired().await.unwrap();
        assert!(matches!(store.save(&mut old).await, Err(SessionError::Expired { .. })));

        let fresh = store.get_or_create("chat-1").await.unwrap();
        assert_ne!(fresh.id(), old.id());
    }

    #[tokio::test]
    async fn inactive_session_cannot_escalate() {
        let (store, _) = sessions();
        store.get_or_create("chat-1").await.unwrap();

        let err = store.escalate("chat-1").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert!(store.resume("chat-1").await.is_err());

        let session = store.get_or_create("chat-1").await.unwrap();
        assert_eq!(session.state(), SessionState::Inactive);
    }

    #[tokio::test]
    async fn save_slides_expiry() {
        let (store, clock) = sessions();
        let original = store.get_or_create("chat-1").await.unwrap();

        clock.advance(chrono::Duration::seconds(1500));
        store.update("chat-1", |s| Ok(s.join("alice"))).await.unwrap();
        clock.advance(chrono::Duration::seconds(1500));

        let fetched = store.get_or_create("chat-1").await.unwrap();
        assert_eq!(fetched.id(), original.id());
    }

    #[tokio::test]
    async fn invalid_transition_leaves_session_unchanged() {
        let (store, _) = sessions();
        let before = store.get_or_create("chat-1").await.unwrap();

        let err = store.transition("chat-1", SessionState::Combat).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert_eq!(err.code(), "invalid_transition");

        let after = store.get_or_create("chat-1").await.unwrap();
        assert_eq!(after.state(), SessionState::Inactive);
        assert_eq!(after.revision(), before.revision());
    }

    #[tokio::test]
    async fn escalate_and_resume() {
        let (store, _) = sessions();
        store.transition("chat-1", SessionState::Active).await.unwrap();
        store.transition("chat-1", SessionState::Combat).await.unwrap();

        let (session, previous) = store.escalate("chat-1").await.unwrap();
        assert_eq!(previous, SessionState::Combat);
        assert!(session.is_waiting_on_human());
        assert!(store.transition("chat-1", SessionState::Active).await.is_err());

        let resumed = store.resume("chat-1").await.unwrap();
        assert_eq!(resumed.state(), SessionState::Active);
        assert!(store.resume("chat-1").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let (store, _) = sessions();
        let store = Arc::new(store);
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.update("chat-1", |s| Ok(s.join(format!("player-{i}")))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let session = store.get_or_create("chat-1").await.unwrap();
        assert_eq!(session.players().len(), 20);
    }

    #[tokio::test]
    async fn undecodable_entry_yields_new_session() {
        let mut cache = MockCachePort::new();
        cache
            .expect_get()
            .returning(|_| Ok(Some("{\"version\":99,\"data\":{}}".to_string())));
        cache.expect_set().times(1).returning(|_, _, _| Ok(()));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Session::new(Arc::new(cache), clock, TTL);

        let session = store.get_or_create("chat-1").await.unwrap();
        assert_eq!(session.state(), SessionState::Inactive);
    }

    #[tokio::test]
    async fn sweep_drops_idle_locks() {
        let (store, clock) = sessions();
        store.get_or_create("chat-1").await.unwrap();
        store.get_or_create("chat-2").await.unwrap();

        clock.advance(chrono::Duration::seconds(1801));
        assert_eq!(store.sweep_expired().await.unwrap(), 2);
        assert!(store.locks.is_empty());
    }
}
