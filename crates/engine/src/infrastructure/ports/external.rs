// Port traits define the full contract - many methods are for future use
#![allow(dead_code)]

//! External service ports: cache, narrative text, notification channels.

use std::time::Duration;

use async_trait::async_trait;

use super::error::{CacheError, NarrativeError, NotifyError};
use super::types::NarrativeContext;

// =============================================================================
// Cache Port
// =============================================================================

/// Key-value store with per-key expiry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CachePort: Send + Sync {
    /// Value for `key` unless absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write `value`, replacing any entry and restarting its expiry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Drop expired entries. Returns how many were removed.
    async fn sweep(&self) -> Result<usize, CacheError>;
}

// =============================================================================
// Narrative Port
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NarrativePort: Send + Sync {
    async fn narrate(&self, context: &NarrativeContext) -> Result<String, NarrativeError>;
}

// =============================================================================
// Notification Port
// =============================================================================

/// One delivery channel for human-facing notices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPort: Send + Sync {
    fn channel(&self) -> String;
    async fn notify(&self, notice: &str) -> Result<(), NotifyError>;
}
