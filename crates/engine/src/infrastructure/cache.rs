//! TTL-based cache for ephemeral state.
//!
//! Backs the session store. Every entry carries its own expiry, measured on
//! the injected clock so tests can move time forward.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::infrastructure::ports::{CacheError, CachePort, ClockPort};

/// A thread-safe cache with per-entry time-to-live.
///
/// Expired entries are never returned, but they are not removed until
/// `cleanup_expired()` is called.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, TtlEntry<V>>>,
    clock: Arc<dyn ClockPort>,
}

struct TtlEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> TtlEntry<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Insert a value, replacing any existing entry and restarting its TTL.
    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = TtlEntry {
            value,
            expires_at: expiry(self.clock.now(), ttl),
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Get a value if it exists and hasn't expired.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let guard = self.entries.read().await;
        guard
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Remove and return a value if it exists (regardless of expiration).
    pub async fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().await.remove(key).map(|e| e.value)
    }

    pub async fn contains(&self, key: &K) -> bool {
        let now = self.clock.now();
        let guard = self.entries.read().await;
        guard.get(key).is_some_and(|entry| entry.is_live(now))
    }

    /// Remove all expired entries and return the count of removed entries.
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.entries.write().await;
        let before_count = guard.len();
        guard.retain(|_, entry| entry.is_live(now));
        before_count - guard.len()
    }

    /// Get the current number of entries (including expired ones not yet cleaned).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get all non-expired entries as a vec of (key, value) pairs.
    pub async fn entries(&self) -> Vec<(K, V)> {
        let now = self.clock.now();
        let guard = self.entries.read().await;
        guard
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .collect()
    }
}

#[async_trait]
impl CachePort for TtlCache<String, String> {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(TtlCache::get(self, &key.to_string()).await)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.insert(key.to_string(), value, ttl).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.remove(&key.to_string()).await.is_some())
    }

    async fn sweep(&self) -> Result<usize, CacheError> {
        Ok(self.cleanup_expired().await)
    }
}
