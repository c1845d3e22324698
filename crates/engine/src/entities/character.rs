//! Character entity operations.
//!
//! Uniqueness and the per-player limit are enforced by the repository as
//! part of each write; this module translates rejected writes into typed
//! errors and retries read-modify-write cycles that lost a revision race.

use std::sync::Arc;

use chatgm_domain::value_objects::{name_format_errors, name_key, sanitize_name};
use chatgm_domain::{
    self as domain, CharacterClass, CharacterDraft, CharacterId, CharacterName, CharacterPatch,
    DomainError, EquipmentItem, ErrorCode, LevelProgress, PatchEffect, PlayerCharacterCount, Race,
    SessionId,
};
use chrono::{DateTime, Utc};

use crate::infrastructure::ports::{
    CharacterRepo, ClockPort, ConstraintRules, RepoError, UniqueConstraint,
};

/// Read-modify-write attempts before a revision race is reported.
const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CharacterError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Character name '{name}' is already taken")]
    DuplicateName {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("You already have an active {race} {class}")]
    DuplicateClassRace { race: Race, class: CharacterClass },

    #[error("Character limit reached: at most {max} active characters")]
    CharacterLimit { max: u32 },

    #[error("Character not found: {0}")]
    NotFound(CharacterId),

    #[error("Storage error: {0}")]
    Storage(RepoError),
}

impl From<DomainError> for CharacterError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(msg) | DomainError::Parse(msg) => Self::Validation(msg),
            DomainError::LimitReached { max, .. } => Self::CharacterLimit { max },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl ErrorCode for CharacterError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::DuplicateClassRace { .. } => "duplicate_class_race",
            Self::CharacterLimit { .. } => "character_limit",
            Self::NotFound(_) => "not_found",
            Self::Storage(e) => e.code(),
        }
    }
}

/// Result of a live name check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCheck {
    pub sanitized: String,
    pub available: bool,
    /// Format problems; empty for a well-formed name.
    pub problems: Vec<String>,
    /// Only filled when a well-formed name is taken.
    pub suggestions: Vec<String>,
}

/// Character entity operations.
pub struct Character {
    repo: Arc<dyn CharacterRepo>,
    clock: Arc<dyn ClockPort>,
    rules: ConstraintRules,
}

impl Character {
    pub fn new(repo: Arc<dyn CharacterRepo>, clock: Arc<dyn ClockPort>, rules: ConstraintRules) -> Self {
        Self { repo, clock, rules }
    }

    pub fn rules(&self) -> ConstraintRules {
        self.rules
    }

    // =========================================================================
    // Create / Delete
    // =========================================================================

    /// Validate `draft` and store a new active character.
    ///
    /// Field validation runs first; name uniqueness, the player limit and
    /// class/race uniqueness are then checked, in that order, by the
    /// repository in the same step as the write.
    pub async fn create(
        &self,
        player_id: &str,
        session_id: SessionId,
        draft: &CharacterDraft,
    ) -> Result<domain::Character, CharacterError> {
        let mut character = domain::Character::create(
            CharacterId::new(),
            player_id,
            session_id,
            draft,
            self.clock.now(),
        )?;

        match self.repo.insert(&character, self.rules).await {
            Ok(revision) => {
                character.set_revision(revision);
                tracing::info!(
                    character_id = %character.id(),
                    player_id = %player_id,
                    name = %character.name(),
                    race = %character.race(),
                    class = %character.class(),
                    "Character created"
                );
                Ok(character)
            }
            Err(e) => {
                let error = self.write_error(e, &character).await;
                tracing::info!(player_id = %player_id, code = error.code(), error = %error, "Character creation rejected");
                Err(error)
            }
        }
    }

    /// Soft delete marks the character inactive and frees its name and
    /// class/race pair. Hard delete removes it and releases the player's slot.
    pub async fn delete(&self, id: CharacterId, soft: bool) -> Result<(), CharacterError> {
        if soft {
            self.modify(id, |character, now| {
                character.deactivate(now);
                Ok(())
            })
            .await?;
        } else {
            self.repo.hard_delete(id).await.map_err(|e| {
                if e.is_not_found() {
                    CharacterError::NotFound(id)
                } else {
                    CharacterError::Storage(e)
                }
            })?;
        }
        tracing::info!(character_id = %id, soft, "Character deleted");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: CharacterId) -> Result<Option<domain::Character>, CharacterError> {
        self.repo.get(id).await.map_err(CharacterError::Storage)
    }

    pub async fn list_for_player(
        &self,
        player_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<domain::Character>, CharacterError> {
        self.repo
            .list_for_player(player_id, include_inactive)
            .await
            .map_err(CharacterError::Storage)
    }

    /// The player's active character in a session, if any.
    pub async fn find_active(
        &self,
        player_id: &str,
        session_id: SessionId,
    ) -> Result<Option<domain::Character>, CharacterError> {
        self.repo
            .find_active(player_id, session_id)
            .await
            .map_err(CharacterError::Storage)
    }

    /// The player's count record, reporting the configured limit.
    pub async fn player_count(&self, player_id: &str) -> Result<PlayerCharacterCount, CharacterError> {
        let mut count = self
            .repo
            .player_count(player_id)
            .await
            .map_err(CharacterError::Storage)?;
        count.set_max_allowed(self.rules.max_per_player);
        Ok(count)
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Whether `name`, once sanitized, is well formed and free.
    pub async fn is_name_available(
        &self,
        name: &str,
        exclude: Option<CharacterId>,
    ) -> Result<bool, CharacterError> {
        let Ok(name) = CharacterName::new(name) else {
            return Ok(false);
        };
        let taken = self
            .repo
            .name_taken(&name.key(), exclude)
            .await
            .map_err(CharacterError::Storage)?;
        Ok(!taken)
    }

    /// Free alternatives for `name`, numbered variants first.
    pub async fn suggest_alternatives(&self, name: &str) -> Result<Vec<String>, CharacterError> {
        let Ok(name) = CharacterName::new(name) else {
            return Ok(Vec::new());
        };
        let mut free = Vec::new();
        for candidate in name.alternatives() {
            let taken = self
                .repo
                .name_taken(&name_key(&candidate), None)
                .await
                .map_err(CharacterError::Storage)?;
            if !taken {
                free.push(candidate);
            }
        }
        Ok(free)
    }

    pub async fn check_name(
        &self,
        name: &str,
        exclude: Option<CharacterId>,
    ) -> Result<NameCheck, CharacterError> {
        let sanitized = sanitize_name(name);
        let problems = name_format_errors(&sanitized);
        if !problems.is_empty() {
            return Ok(NameCheck {
                sanitized,
                available: false,
                problems,
                suggestions: Vec::new(),
            });
        }

        let available = self.is_name_available(&sanitized, exclude).await?;
        let suggestions = if available {
            Vec::new()
        } else {
            self.suggest_alternatives(&sanitized).await?
        };
        Ok(NameCheck {
            sanitized,
            available,
            problems,
            suggestions,
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Change only the fields `patch` carries. Uniqueness is re-checked for
    /// the name and class/race pair only when they change.
    pub async fn update(
        &self,
        id: CharacterId,
        patch: &CharacterPatch,
    ) -> Result<domain::Character, CharacterError> {
        let (character, effect) = self
            .write(id, |character, now| {
                let effect = character.apply_patch(patch, now)?;
                Ok((effect, effect))
            })
            .await?;
        tracing::info!(
            character_id = %id,
            revision = character.revision(),
            renamed = effect.name_changed,
            class_race_changed = effect.class_race_changed,
            "Character updated"
        );
        Ok(character)
    }

    pub async fn add_experience(
        &self,
        id: CharacterId,
        amount: u32,
    ) -> Result<LevelProgress, CharacterError> {
        let (character, progress) = self
            .modify(id, |character, now| Ok(character.add_experience(amount, now)))
            .await?;
        if progress.leveled_up {
            tracing::info!(
                character_id = %id,
                level = character.level().value(),
                "Character leveled up"
            );
        }
        Ok(progress)
    }

    /// Administrative experience correction; the level is left as is.
    pub async fn correct_experience(
        &self,
        id: CharacterId,
        experience: u32,
    ) -> Result<domain::Character, CharacterError> {
        let (character, _) = self
            .modify(id, |character, now| {
                character.correct_experience(experience, now);
                Ok(())
            })
            .await?;
        tracing::warn!(character_id = %id, experience, "Experience corrected by administrator");
        Ok(character)
    }

    pub async fn apply_damage(
        &self,
        id: CharacterId,
        amount: u32,
    ) -> Result<domain::Character, CharacterError> {
        let (character, _) = self
            .modify(id, |character, now| Ok(character.apply_damage(amount, now)))
            .await?;
        Ok(character)
    }

    pub async fn heal(&self, id: CharacterId, amount: u32) -> Result<domain::Character, CharacterError> {
        let (character, _) = self
            .modify(id, |character, now| Ok(character.heal(amount, now)))
            .await?;
        Ok(character)
    }

    pub async fn add_equipment(
        &self,
        id: CharacterId,
        item: EquipmentItem,
    ) -> Result<domain::Character, CharacterError> {
        let (character, _) = self
            .modify(id, |character, now| character.add_equipment(item.clone(), now))
            .await?;
        Ok(character)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Read-modify-write for changes that leave the name and class/race alone.
    async fn modify<T, F>(
        &self,
        id: CharacterId,
        mut change: F,
    ) -> Result<(domain::Character, T), CharacterError>
    where
        F: FnMut(&mut domain::Character, DateTime<Utc>) -> Result<T, DomainError> + Send,
        T: Send,
    {
        self.write(id, |character, now| Ok((change(character, now)?, PatchEffect::default())))
            .await
    }

    /// Read-modify-write with optimistic retry. The class/race rule is only
    /// re-checked when `change` reports that the pair moved.
    async fn write<T, F>(
        &self,
        id: CharacterId,
        mut change: F,
    ) -> Result<(domain::Character, T), CharacterError>
    where
        F: FnMut(&mut domain::Character, DateTime<Utc>) -> Result<(T, PatchEffect), DomainError> + Send,
        T: Send,
    {
        let mut last_error = None;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut character = self
                .repo
                .get(id)
                .await
                .map_err(CharacterError::Storage)?
                .ok_or(CharacterError::NotFound(id))?;
            let expected = character.revision();

            let (outcome, effect) = change(&mut character, self.clock.now())?;

            let rules = ConstraintRules {
                enforce_class_race: self.rules.enforce_class_race && effect.class_race_changed,
                ..self.rules
            };
            match self.repo.update(&character, expected, rules).await {
                Ok(revision) => {
                    character.set_revision(revision);
                    return Ok((character, outcome));
                }
                Err(e) if e.is_stale() => {
                    tracing::debug!(character_id = %id, attempt, "Character changed concurrently, retrying");
                    last_error = Some(e);
                }
                Err(e) => return Err(self.write_error(e, &character).await),
            }
        }
        Err(CharacterError::Storage(last_error.unwrap_or_else(|| {
            RepoError::database("update_character", "no write attempted")
        })))
    }

    async fn write_error(&self, error: RepoError, character: &domain::Character) -> CharacterError {
        match error {
            RepoError::Conflict(UniqueConstraint::CharacterName) => {
                let name = character.name().to_string();
                let suggestions = match self.suggest_alternatives(&name).await {
                    Ok(suggestions) => suggestions,
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not compute name suggestions");
                        Vec::new()
                    }
                };
                CharacterError::DuplicateName { name, suggestions }
            }
            RepoError::Conflict(UniqueConstraint::PlayerClassRace) => {
                CharacterError::DuplicateClassRace {
                    race: character.race(),
                    class: character.class(),
                }
            }
            RepoError::Conflict(UniqueConstraint::PlayerCharacterLimit) => {
                CharacterError::CharacterLimit {
                    max: self.rules.max_per_player,
                }
            }
            e if e.is_not_found() => CharacterError::NotFound(character.id()),
            e => CharacterError::Storage(e),
        }
    }
}
