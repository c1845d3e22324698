//! Chat GM domain: the rules and state core of an automated game master.
//!
//! ## Structure
//!
//! - `value_objects/` - dice, ability math, names, closed enumerations
//! - `aggregates/` - `Character`, `PlayerCharacterCount`, `Session`, `Intervention`
//! - `serialization` - versioned wire format for the aggregates
//!
//! This crate does no I/O and owns no RNG; randomness is injected as a
//! closure so every roll is reproducible in tests.

pub mod aggregates;
pub mod error;
pub mod ids;
pub mod serialization;
pub mod value_objects;

pub use aggregates::{
    Character, CharacterDraft, CharacterPatch, Difficulty, HealthStatus, Intervention,
    InterventionContext, InterventionStatus, LevelProgress, PatchEffect, PlayerCharacterCount,
    Resolution, Session, SessionSettings, SessionState, TriggerType, WorldState,
    DEFAULT_MAX_CHARACTERS,
};
pub use error::{DomainError, ErrorCode};
pub use ids::{CharacterId, InterventionId, SessionId};
pub use serialization::SerializationError;
pub use value_objects::{
    ability_modifier, proficiency_bonus, roll_ability_scores, Ability, AbilityScores,
    AdvantageMode, Alignment, CharacterClass, CharacterName, DiceError, DiceExpression,
    EquipmentItem, EquipmentKind, KnownSpells, Level, Proficiency, Race, RollResult, Skill,
};
