//! In-memory character repository.
//!
//! All tables live behind one lock, so each insert, update or delete checks
//! its constraints and writes in a single critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use chatgm_domain::serialization::{decode_character, encode_character};
use chatgm_domain::{
    Character, CharacterClass, CharacterId, PlayerCharacterCount, Race, SessionId,
    DEFAULT_MAX_CHARACTERS,
};
use tokio::sync::Mutex;

use crate::infrastructure::ports::{CharacterRepo, ConstraintRules, RepoError, UniqueConstraint};

type ClassRaceKey = (String, CharacterClass, Race);

#[derive(Default)]
struct CharacterTables {
    /// Encoded records by id.
    records: HashMap<CharacterId, StoredCharacter>,
    /// Lowercased name of every active character.
    active_names: HashMap<String, CharacterId>,
    /// Every active character's (player, class, race), with multiplicity
    /// for rows written while the rule was switched off.
    class_race: HashMap<ClassRaceKey, Vec<CharacterId>>,
    counts: HashMap<String, PlayerCharacterCount>,
}

struct StoredCharacter {
    revision: u64,
    player_id: String,
    session_id: SessionId,
    is_active: bool,
    name_key: String,
    class_race: ClassRaceKey,
    encoded: String,
}

impl StoredCharacter {
    fn from_character(character: &Character, revision: u64) -> Result<Self, RepoError> {
        let mut snapshot = character.clone();
        snapshot.set_revision(revision);
        let encoded = encode_character(&snapshot).map_err(RepoError::serialization)?;
        Ok(Self {
            revision,
            player_id: character.player_id().to_string(),
            session_id: character.session_id(),
            is_active: character.is_active(),
            name_key: character.name().key(),
            class_race: class_race_key(character),
            encoded,
        })
    }

    fn decode(&self) -> Result<Character, RepoError> {
        decode_character(&self.encoded).map_err(RepoError::serialization)
    }
}

fn class_race_key(character: &Character) -> ClassRaceKey {
    (
        character.player_id().to_string(),
        character.class(),
        character.race(),
    )
}

impl CharacterTables {
    fn index(&mut self, id: CharacterId, stored: &StoredCharacter) {
        if !stored.is_active {
            return;
        }
        self.active_names.insert(stored.name_key.clone(), id);
        self.class_race
            .entry(stored.class_race.clone())
            .or_default()
            .push(id);
    }

    fn unindex(&mut self, id: CharacterId, stored: &StoredCharacter) {
        if !stored.is_active {
            return;
        }
        if self.active_names.get(&stored.name_key) == Some(&id) {
            self.active_names.remove(&stored.name_key);
        }
        if let Some(owners) = self.class_race.get_mut(&stored.class_race) {
            owners.retain(|owner| *owner != id);
            if owners.is_empty() {
                self.class_race.remove(&stored.class_race);
            }
        }
    }

    fn name_owner_other_than(&self, key: &str, id: CharacterId) -> bool {
        self.active_names
            .get(key)
            .is_some_and(|owner| *owner != id)
    }

    fn class_race_owner_other_than(&self, key: &ClassRaceKey, id: CharacterId) -> bool {
        self.class_race
            .get(key)
            .is_some_and(|owners| owners.iter().any(|owner| *owner != id))
    }

    fn decode_matching<F>(&self, mut keep: F) -> Result<Vec<Character>, RepoError>
    where
        F: FnMut(&StoredCharacter) -> bool,
    {
        let mut characters = self
            .records
            .values()
            .filter(|stored| keep(stored))
            .map(StoredCharacter::decode)
            .collect::<Result<Vec<_>, _>>()?;
        characters.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(characters)
    }
}

pub struct InMemoryCharacterRepo {
    tables: Mutex<CharacterTables>,
}

impl InMemoryCharacterRepo {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(CharacterTables::default()),
        }
    }
}

impl Default for InMemoryCharacterRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CharacterRepo for InMemoryCharacterRepo {
    async fn insert(&self, character: &Character, rules: ConstraintRules) -> Result<u64, RepoError> {
        let id = character.id();
        let stored = StoredCharacter::from_character(character, 1)?;

        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        if tables.records.contains_key(&id) {
            return Err(RepoError::constraint(format!("Character {} already exists", id)));
        }
        if stored.is_active && tables.name_owner_other_than(&stored.name_key, id) {
            return Err(RepoError::conflict(UniqueConstraint::CharacterName));
        }
        let class_race_taken = rules.enforce_class_race
            && stored.is_active
            && tables.class_race_owner_other_than(&stored.class_race, id);

        let count = tables
            .counts
            .entry(stored.player_id.clone())
            .or_insert_with(|| PlayerCharacterCount::new(&stored.player_id, rules.max_per_player));
        count.set_max_allowed(rules.max_per_player);
        if !count.can_create() {
            return Err(RepoError::conflict(UniqueConstraint::PlayerCharacterLimit));
        }
        if class_race_taken {
            return Err(RepoError::conflict(UniqueConstraint::PlayerClassRace));
        }
        count
            .increment()
            .map_err(|_| RepoError::conflict(UniqueConstraint::PlayerCharacterLimit))?;

        tables.index(id, &stored);
        tables.records.insert(id, stored);
        tracing::debug!(character_id = %id, "Character inserted");
        Ok(1)
    }

    async fn update(
        &self,
        character: &Character,
        expected_revision: u64,
        rules: ConstraintRules,
    ) -> Result<u64, RepoError> {
        let id = character.id();
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        let current = tables
            .records
            .get(&id)
            .ok_or_else(|| RepoError::not_found("Character", id))?;
        if current.revision != expected_revision {
            return Err(RepoError::stale(
                "Character",
                id,
                expected_revision,
                current.revision,
            ));
        }

        let next = StoredCharacter::from_character(character, expected_revision + 1)?;
        if next.is_active && tables.name_owner_other_than(&next.name_key, id) {
            return Err(RepoError::conflict(UniqueConstraint::CharacterName));
        }
        if rules.enforce_class_race
            && next.is_active
            && tables.class_race_owner_other_than(&next.class_race, id)
        {
            return Err(RepoError::conflict(UniqueConstraint::PlayerClassRace));
        }

        if let Some(previous) = tables.records.remove(&id) {
            tables.unindex(id, &previous);
        }
        let revision = next.revision;
        tables.index(id, &next);
        tables.records.insert(id, next);
        Ok(revision)
    }

    async fn get(&self, id: CharacterId) -> Result<Option<Character>, RepoError> {
        let tables = self.tables.lock().await;
        tables.records.get(&id).map(StoredCharacter::decode).transpose()
    }

    async fn list_for_player(
        &self,
        player_id: &str,
        include_inactive: bool,
    ) -> Result<Vec<Character>, RepoError> {
        let tables = self.tables.lock().await;
        tables.decode_matching(|stored| {
            stored.player_id == player_id && (include_inactive || stored.is_active)
        })
    }

    async fn find_active(
        &self,
        player_id: &str,
        session_id: SessionId,
    ) -> Result<Option<Character>, RepoError> {
        let tables = self.tables.lock().await;
        let mut matches = tables.decode_matching(|stored| {
            stored.is_active && stored.player_id == player_id && stored.session_id == session_id
        })?;
        Ok(matches.pop())
    }

    async fn name_taken(&self, name_key: &str, exclude: Option<CharacterId>) -> Result<bool, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .active_names
            .get(name_key)
            .is_some_and(|owner| Some(*owner) != exclude))
    }

    async fn hard_delete(&self, id: CharacterId) -> Result<(), RepoError> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;

        let stored = tables
            .records
            .remove(&id)
            .ok_or_else(|| RepoError::not_found("Character", id))?;
        tables.unindex(id, &stored);
        if let Some(count) = tables.counts.get_mut(&stored.player_id) {
            count.decrement();
        }
        tracing::debug!(character_id = %id, player_id = %stored.player_id, "Character removed");
        Ok(())
    }

    async fn player_count(&self, player_id: &str) -> Result<PlayerCharacterCount, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .counts
            .get(player_id)
            .cloned()
            .unwrap_or_else(|| PlayerCharacterCount::new(player_id, DEFAULT_MAX_CHARACTERS)))
    }
}
