// Port traits define the full contract - many methods are for future use
#![allow(dead_code)]

//! Error types for port operations.

use std::fmt;

use chatgm_domain::ErrorCode;

/// Uniqueness rules enforced by the character store at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueConstraint {
    /// Case-insensitive name across all active characters.
    CharacterName,
    /// (player, class, race) among one player's active characters.
    PlayerClassRace,
    /// Per-player active character limit.
    PlayerCharacterLimit,
}

impl fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CharacterName => "character_name",
            Self::PlayerClassRace => "player_class_race",
            Self::PlayerCharacterLimit => "player_character_limit",
        };
        write!(f, "{}", name)
    }
}

/// Repository operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Entity not found - includes entity type and ID for actionable error messages.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Storage operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Business constraint violated.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A uniqueness or limit rule rejected the write. Nothing was written.
    #[error("Unique constraint violated: {0}")]
    Conflict(UniqueConstraint),

    /// The stored record moved on since it was read.
    #[error("Stale revision for {entity_type} {id}: expected {expected}, found {found}")]
    StaleRevision {
        entity_type: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },
}

impl RepoError {
    /// Create a NotFound error with entity type and ID context.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    pub fn constraint(message: impl ToString) -> Self {
        Self::ConstraintViolation(message.to_string())
    }

    pub fn conflict(constraint: UniqueConstraint) -> Self {
        Self::Conflict(constraint)
    }

    pub fn stale(entity_type: &'static str, id: impl ToString, expected: u64, found: u64) -> Self {
        Self::StaleRevision {
            entity_type,
            id: id.to_string(),
            expected,
            found,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleRevision { .. })
    }
}

impl ErrorCode for RepoError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Database { .. } | Self::Serialization(_) => "storage_error",
            Self::ConstraintViolation(_) => "validation_error",
            Self::Conflict(UniqueConstraint::CharacterName) => "duplicate_name",
            Self::Conflict(UniqueConstraint::PlayerClassRace) => "duplicate_class_race",
            Self::Conflict(UniqueConstraint::PlayerCharacterLimit) => "character_limit",
            Self::StaleRevision { .. } => "stale_revision",
        }
    }
}

/// Key-value cache failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("Cache error in {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl CacheError {
    pub fn backend(operation: &'static str, message: impl ToString) -> Self {
        Self::Backend {
            operation,
            message: message.to_string(),
        }
    }
}

impl ErrorCode for CacheError {
    fn code(&self) -> &'static str {
        "cache_error"
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NarrativeError {
    #[error("Narrative request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid narrative response: {0}")]
    InvalidResponse(String),
}

impl ErrorCode for NarrativeError {
    fn code(&self) -> &'static str {
        "narrative_error"
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery through {channel} failed: {message}")]
    Delivery { channel: String, message: String },
    #[error("Channel {0} is not configured")]
    Unavailable(String),
}

impl NotifyError {
    pub fn delivery(channel: impl Into<String>, message: impl ToString) -> Self {
        Self::Delivery {
            channel: channel.into(),
            message: message.to_string(),
        }
    }
}

impl ErrorCode for NotifyError {
    fn code(&self) -> &'static str {
        "notify_error"
    }
}
