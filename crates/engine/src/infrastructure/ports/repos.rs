// Port traits define the full contract - many methods are for future use
#![allow(dead_code)]

//! Repository port traits for record storage.

use async_trait::async_trait;
use chatgm_domain::{Character, CharacterId, Intervention, InterventionId, PlayerCharacterCount, SessionId};

use super::error::RepoError;
use super::types::ConstraintRules;

// =============================================================================
// Character Storage
// =============================================================================

/// Durable character records.
///
/// Implementations enforce name uniqueness, the per-player limit and
/// (when enabled) class/race uniqueness as part of the write itself. A
/// rejected write surfaces as `RepoError::Conflict` and leaves storage
/// unchanged. Checks run in that order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterRepo: Send + Sync {
    /// Insert a new character and reserve a slot in the owner's count.
    /// Returns the stored revision.
    async fn insert(&self, character: &Character, rules: ConstraintRules) -> Result<u64, RepoError>;

    /// Replace a stored character if its revision still equals
    /// `expected_revision`. Returns the new revision.
    async fn update(
        &self,
        character: &Character,
        expected_revision: u64,
        rules: ConstraintRules,
    ) -> Result<u64, RepoError>;

    async fn get(&self, id: CharacterId) -> Result<Option<Character>, RepoError>;

    async fn list_for_player(
        &self,
        player_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<Character>, RepoError>;

    async fn find_active(
        &self,
        player_id: &str,
        session_id: SessionId,
    ) -> Result<Option<Character>, RepoError>;

    /// Whether an active character other than `exclude` holds the name key.
    async fn name_taken(&self, name_key: &str, exclude: Option<CharacterId>) -> Result<bool, RepoError>;

    /// Remove the record and release its slot in the owner's count.
    async fn hard_delete(&self, id: CharacterId) -> Result<(), RepoError>;

    async fn player_count(&self, player_id: &str) -> Result<PlayerCharacterCount, RepoError>;
}

// =============================================================================
// Intervention Storage
// =============================================================================

/// Pending interventions plus a bounded log of resolved ones.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InterventionRepo: Send + Sync {
    /// Insert or replace. A resolved intervention leaves the pending set and
    /// enters the history log, evicting the oldest entry at capacity.
    async fn save(&self, intervention: &Intervention) -> Result<(), RepoError>;

    async fn get(&self, id: InterventionId) -> Result<Option<Intervention>, RepoError>;

    /// Oldest first.
    async fn pending(&self) -> Result<Vec<Intervention>, RepoError>;

    async fn pending_for_chat(&self, chat_id: &str) -> Result<Vec<Intervention>, RepoError>;

    /// Newest first, at most `limit` entries.
    async fn history(&self, limit: usize) -> Result<Vec<Intervention>, RepoError>;
}
