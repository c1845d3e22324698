//! Character aggregate - a player's adventurer in a chat session
//!
//! # Rustic DDD Design
//!
//! - **Private fields**: every mutation goes through a method that keeps the
//!   invariants below
//! - **Derived values on read**: ability modifiers, proficiency bonus and the
//!   default armor class are computed from stored fields, never stored
//! - **Raw input at the edge**: [`CharacterDraft`] and [`CharacterPatch`]
//!   carry unvalidated attributes; validation happens once, before any change

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DomainError;
use crate::ids::{CharacterId, SessionId};
use crate::value_objects::{
    experience_for_level, starting_hit_points, Ability, AbilityScores, Alignment, CharacterClass,
    CharacterName, EquipmentItem, InsertionSet, KnownSpells, Level, Proficiency, Race, Skill,
};

const MAX_BACKGROUND_LENGTH: usize = 500;

/// A player character
///
/// # Invariants
///
/// - `hit_points_current` is in `0..=hit_points_max` and `hit_points_max >= 1`
/// - ability scores are in `1..=30` (enforced by `AbilityScores`)
/// - `level` is in `1..=20` (enforced by `Level`)
/// - `name` is sanitized and format-checked (enforced by `CharacterName`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    // Identity
    id: CharacterId,
    player_id: String,
    session_id: SessionId,
    name: CharacterName,

    // Classification
    race: Race,
    class: CharacterClass,
    alignment: Option<Alignment>,
    background: Option<String>,

    // Progression
    level: Level,
    experience: u32,
    abilities: AbilityScores,

    // Combat
    hit_points_max: i32,
    hit_points_current: i32,
    armor_class_override: Option<i32>,

    // Collections
    proficiencies: InsertionSet<Proficiency>,
    equipment: InsertionSet<EquipmentItem>,
    spells: KnownSpells,

    // Lifecycle
    is_active: bool,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// What a patch touched, so the store knows which uniqueness rules to re-check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchEffect {
    pub name_changed: bool,
    pub class_race_changed: bool,
}

/// Outcome of [`Character::add_experience`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub leveled_up: bool,
    pub new_level: Level,
    pub levels_gained: u8,
}

/// Coarse condition derived from the hit point ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Wounded,
    BadlyWounded,
    Critical,
    Unconscious,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Wounded => "wounded",
            Self::BadlyWounded => "badly wounded",
            Self::Critical => "critical",
            Self::Unconscious => "unconscious",
        }
    }
}

impl Character {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Validate `draft` and build a new active character.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if any attribute is out of range or
    /// not a member of its enumeration. Nothing is built on failure.
    pub fn create(
        id: CharacterId,
        player_id: impl Into<String>,
        session_id: SessionId,
        draft: &CharacterDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let player_id = player_id.into();
        if player_id.trim().is_empty() {
            return Err(DomainError::validation("Player id cannot be empty"));
        }

        let name = CharacterName::new(&draft.name)?;
        let race: Race = draft.race.parse()?;
        let class: CharacterClass = draft.class.parse()?;
        let alignment = parse_optional(draft.alignment.as_deref())?;
        let background = validate_background(draft.background.as_deref())?;
        let level = Level::new(draft.level.unwrap_or(1))?;
        let experience = match draft.experience {
            Some(xp) => validate_experience(xp)?,
            None => experience_for_level(level.value()).unwrap_or(0),
        };
        let abilities = match draft.abilities {
            Some(values) => AbilityScores::new(values)?,
            None => AbilityScores::default(),
        };

        let hit_points_max = match draft.hit_points_max {
            Some(max) => validate_hit_points_max(max)?,
            None => starting_hit_points(class.hit_die(), abilities.modifier(Ability::Constitution)),
        };
        let hit_points_current = draft.hit_points_current.unwrap_or(hit_points_max);
        validate_hit_points_current(hit_points_current, hit_points_max)?;
        let armor_class_override = draft.armor_class.map(validate_armor_class).transpose()?;

        for item in &draft.equipment {
            item.validate()?;
        }
        let spells = KnownSpells::try_from(draft.spells.clone())?;

        Ok(Self {
            id,
            player_id,
            session_id,
            name,
            race,
            class,
            alignment,
            background,
            level,
            experience,
            abilities,
            hit_points_max,
            hit_points_current,
            armor_class_override,
            proficiencies: draft.proficiencies.iter().cloned().collect(),
            equipment: draft.equipment.iter().cloned().collect(),
            spells,
            is_active: true,
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    // =========================================================================
    // Identity Accessors (read-only)
    // =========================================================================

    #[inline]
    pub fn id(&self) -> CharacterId {
        self.id
    }

    /// Returns the external chat identity of the owning player.
    #[inline]
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    #[inline]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[inline]
    pub fn name(&self) -> &CharacterName {
        &self.name
    }

    #[inline]
    pub fn race(&self) -> Race {
        self.race
    }

    #[inline]
    pub fn class(&self) -> CharacterClass {
        self.class
    }

    pub fn alignment(&self) -> Option<Alignment> {
        self.alignment
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    // =========================================================================
    // Progression
    // =========================================================================

    #[inline]
    pub fn level(&self) -> Level {
        self.level
    }

    #[inline]
    pub fn experience(&self) -> u32 {
        self.experience
    }

    pub fn abilities(&self) -> &AbilityScores {
        &self.abilities
    }

    pub fn ability_modifier(&self, ability: Ability) -> i32 {
        self.abilities.modifier(ability)
    }

    pub fn proficiency_bonus(&self) -> i32 {
        self.level.proficiency_bonus()
    }

    /// Experience still needed for the next level; `None` at level 20.
    pub fn experience_to_next_level(&self) -> Option<u32> {
        let next = self.level.next()?;
        let threshold = experience_for_level(next.value())?;
        Some(threshold.saturating_sub(self.experience))
    }

    // =========================================================================
    // Combat
    // =========================================================================

    #[inline]
    pub fn hit_points_max(&self) -> i32 {
        self.hit_points_max
    }

    #[inline]
    pub fn hit_points_current(&self) -> i32 {
        self.hit_points_current
    }

    /// Explicit override, otherwise `10 + DEX modifier`.
    pub fn armor_class(&self) -> i32 {
        self.armor_class_override
            .unwrap_or_else(|| 10 + self.ability_modifier(Ability::Dexterity))
    }

    pub fn is_proficient(&self, skill: Skill) -> bool {
        self.proficiencies.contains(&Proficiency::Skill(skill))
    }

    pub fn skill_modifier(&self, skill: Skill) -> i32 {
        let base = self.ability_modifier(skill.ability());
        if self.is_proficient(skill) {
            base + self.proficiency_bonus()
        } else {
            base
        }
    }

    pub fn saving_throw_modifier(&self, ability: Ability) -> i32 {
        let base = self.ability_modifier(ability);
        if self.proficiencies.contains(&Proficiency::SavingThrow(ability)) {
            base + self.proficiency_bonus()
        } else {
            base
        }
    }

    /// Spell save DC for spellcasting classes.
    pub fn spell_save_dc(&self) -> Option<i32> {
        let ability = self.class.spellcasting_ability()?;
        Some(crate::value_objects::spell_save_dc(
            self.ability_modifier(ability),
            self.proficiency_bonus(),
        ))
    }

    pub fn spell_attack_bonus(&self) -> Option<i32> {
        let ability = self.class.spellcasting_ability()?;
        Some(crate::value_objects::spell_attack_bonus(
            self.ability_modifier(ability),
            self.proficiency_bonus(),
        ))
    }

    pub fn health_status(&self) -> HealthStatus {
        if self.hit_points_current <= 0 {
            return HealthStatus::Unconscious;
        }
        let percent = self.hit_points_current as i64 * 100 / self.hit_points_max as i64;
        match percent {
            p if p >= 75 => HealthStatus::Healthy,
            p if p >= 50 => HealthStatus::Wounded,
            p if p >= 25 => HealthStatus::BadlyWounded,
            _ => HealthStatus::Critical,
        }
    }

    // =========================================================================
    // Collections
    // =========================================================================

    pub fn proficiencies(&self) -> &InsertionSet<Proficiency> {
        &self.proficiencies
    }

    pub fn equipment(&self) -> &InsertionSet<EquipmentItem> {
        &self.equipment
    }

    pub fn spells(&self) -> &KnownSpells {
        &self.spells
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Storage revision, bumped on every successful write.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Record the revision assigned by storage.
    pub fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply `patch`, changing only the fields it carries.
    ///
    /// All fields are validated before anything is written: on error the
    /// character is left untouched.
    pub fn apply_patch(
        &mut self,
        patch: &CharacterPatch,
        now: DateTime<Utc>,
    ) -> Result<PatchEffect, DomainError> {
        let mut next = self.clone();

        if let Some(raw) = &patch.name {
            next.name = CharacterName::new(raw)?;
        }
        if let Some(raw) = &patch.race {
            next.race = raw.parse()?;
        }
        if let Some(raw) = &patch.class {
            next.class = raw.parse()?;
        }
        if let Some(raw) = &patch.alignment {
            next.alignment = parse_optional(Some(raw.as_str()))?;
        }
        if let Some(raw) = &patch.background {
            next.background = validate_background(Some(raw.as_str()))?;
        }
        if let Some(level) = patch.level {
            next.level = Level::new(level)?;
        }
        if let Some(xp) = patch.experience {
            next.experience = validate_experience(xp)?;
        }
        if let Some(values) = patch.abilities {
            next.abilities = AbilityScores::new(values)?;
        }
        if let Some(max) = patch.hit_points_max {
            next.hit_points_max = validate_hit_points_max(max)?;
            if patch.hit_points_current.is_none() {
                next.hit_points_current = next.hit_points_current.min(next.hit_points_max);
            }
        }
        if let Some(current) = patch.hit_points_current {
            next.hit_points_current = current;
        }
        validate_hit_points_current(next.hit_points_current, next.hit_points_max)?;
        if let Some(ac) = patch.armor_class {
            next.armor_class_override = Some(validate_armor_class(ac)?);
        }
        if let Some(items) = &patch.proficiencies {
            next.proficiencies = items.iter().cloned().collect();
        }
        if let Some(items) = &patch.equipment {
            for item in items {
                item.validate()?;
            }
            next.equipment = items.iter().cloned().collect();
        }
        if let Some(spells) = &patch.spells {
            next.spells = KnownSpells::try_from(spells.clone())?;
        }

        let effect = PatchEffect {
            name_changed: next.name.key() != self.name.key(),
            class_race_changed: next.class != self.class || next.race != self.race,
        };
        next.updated_at = now;
        *self = next;
        Ok(effect)
    }

    /// Subtract hit points, stopping at 0. Returns the new current value.
    pub fn apply_damage(&mut self, amount: u32, now: DateTime<Utc>) -> i32 {
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.hit_points_current = self.hit_points_current.saturating_sub(amount).max(0);
        self.updated_at = now;
        self.hit_points_current
    }

    /// Add hit points, stopping at the maximum. Returns the new current value.
    pub fn heal(&mut self, amount: u32, now: DateTime<Utc>) -> i32 {
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.hit_points_current = self
            .hit_points_current
            .saturating_add(amount)
            .min(self.hit_points_max);
        self.updated_at = now;
        self.hit_points_current
    }

    /// Add experience and level up while the threshold table allows it.
    /// Level 20 is terminal regardless of experience.
    pub fn add_experience(&mut self, amount: u32, now: DateTime<Utc>) -> LevelProgress {
        self.experience = self.experience.saturating_add(amount);
        let start = self.level;
        while let Some(next) = self.level.next() {
            match experience_for_level(next.value()) {
                Some(threshold) if self.experience >= threshold => self.level = next,
                _ => break,
            }
        }
        self.updated_at = now;
        LevelProgress {
            leveled_up: self.level > start,
            new_level: self.level,
            levels_gained: self.level.value() - start.value(),
        }
    }

    /// Explicit administrative correction; may lower experience and never
    /// changes the level.
    pub fn correct_experience(&mut self, experience: u32, now: DateTime<Utc>) {
        self.experience = experience;
        self.updated_at = now;
    }

    /// Add an item, merging quantities with a stackable item already carried.
    pub fn add_equipment(&mut self, item: EquipmentItem, now: DateTime<Utc>) -> Result<(), DomainError> {
        item.validate()?;
        match self.equipment.iter_mut().find(|existing| existing.stacks_with(&item)) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                existing.equipped |= item.equipped;
            }
            None => {
                self.equipment.insert(item);
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn add_proficiency(&mut self, proficiency: Proficiency, now: DateTime<Utc>) -> bool {
        let added = self.proficiencies.insert(proficiency);
        if added {
            self.updated_at = now;
        }
        added
    }

    pub fn learn_spell(
        &mut self,
        level: u8,
        spell: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let added = self.spells.learn(level, spell)?;
        if added {
            self.updated_at = now;
        }
        Ok(added)
    }

    /// Re-check invariants that serde alone cannot (used after decoding).
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        validate_hit_points_max(self.hit_points_max)?;
        validate_hit_points_current(self.hit_points_current, self.hit_points_max)?;
        if let Some(ac) = self.armor_class_override {
            validate_armor_class(ac)?;
        }
        Ok(())
    }
}

// =============================================================================
// Raw input
// =============================================================================

/// Unvalidated attributes for a new character.
///
/// Missing optional fields get rule defaults: level 1, all scores 10,
/// `hit_points_max = max(1, hit die + CON modifier)`, full hit points.
/// Abilities are in STR, DEX, CON, INT, WIS, CHA order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterDraft {
    pub name: String,
    pub race: String,
    pub class: String,
    pub alignment: Option<String>,
    pub background: Option<String>,
    pub level: Option<i32>,
    pub experience: Option<i64>,
    pub abilities: Option<[i32; 6]>,
    pub hit_points_max: Option<i32>,
    pub hit_points_current: Option<i32>,
    pub armor_class: Option<i32>,
    pub proficiencies: Vec<Proficiency>,
    pub equipment: Vec<EquipmentItem>,
    pub spells: BTreeMap<u8, Vec<String>>,
}

impl CharacterDraft {
    pub fn new(name: impl Into<String>, race: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            race: race.into(),
            class: class.into(),
            ..Default::default()
        }
    }

    pub fn with_abilities(mut self, abilities: [i32; 6]) -> Self {
        self.abilities = Some(abilities);
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    /// Field-level validation only, without building anything.
    pub fn validate(&self) -> Result<(), DomainError> {
        Character::create(
            CharacterId::new(),
            "validation",
            SessionId::new(),
            self,
            DateTime::<Utc>::default(),
        )
        .map(|_| ())
    }
}

/// Partial update: only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterPatch {
    pub name: Option<String>,
    pub race: Option<String>,
    pub class: Option<String>,
    pub alignment: Option<String>,
    pub background: Option<String>,
    pub level: Option<i32>,
    pub experience: Option<i64>,
    pub abilities: Option<[i32; 6]>,
    pub hit_points_max: Option<i32>,
    pub hit_points_current: Option<i32>,
    pub armor_class: Option<i32>,
    pub proficiencies: Option<Vec<Proficiency>>,
    pub equipment: Option<Vec<EquipmentItem>>,
    pub spells: Option<BTreeMap<u8, Vec<String>>>,
}

impl CharacterPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Field validation
// =============================================================================

fn parse_optional<T>(raw: Option<&str>) -> Result<Option<T>, DomainError>
where
    T: std::str::FromStr<Err = DomainError>,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

fn validate_background(raw: Option<&str>) -> Result<Option<String>, DomainError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > MAX_BACKGROUND_LENGTH => Err(DomainError::validation(
            format!("Background cannot exceed {} characters", MAX_BACKGROUND_LENGTH),
        )),
        Some(text) => Ok(Some(text.to_string())),
    }
}

fn validate_experience(xp: i64) -> Result<u32, DomainError> {
    u32::try_from(xp).map_err(|_| {
        DomainError::validation(format!(
            "Experience must be between 0 and {}, got {}",
            u32::MAX,
            xp
        ))
    })
}

fn validate_hit_points_max(max: i32) -> Result<i32, DomainError> {
    if max < 1 {
        return Err(DomainError::validation(format!(
            "Maximum hit points must be at least 1, got {}",
            max
        )));
    }
    Ok(max)
}

fn validate_hit_points_current(current: i32, max: i32) -> Result<(), DomainError> {
    if !(0..=max).contains(&current) {
        return Err(DomainError::validation(format!(
            "Current hit points must be between 0 and {}, got {}",
            max, current
        )));
    }
    Ok(())
}

fn validate_armor_class(ac: i32) -> Result<i32, DomainError> {
    if ac < 1 {
        return Err(DomainError::validation(format!(
            "Armor class must be at least 1, got {}",
            ac
        )));
    }
    Ok(ac)
}
