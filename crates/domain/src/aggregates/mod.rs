//! Aggregates: the consistency boundaries of the game core.

pub mod character;
pub mod intervention;
pub mod player_character_count;
pub mod session;

pub use character::{
    Character, CharacterDraft, CharacterPatch, HealthStatus, LevelProgress, PatchEffect,
};
pub use intervention::{
    Intervention, InterventionContext, InterventionStatus, Resolution, TriggerType,
};
pub use player_character_count::{PlayerCharacterCount, DEFAULT_MAX_CHARACTERS};
pub use session::{
    Difficulty, Session, SessionSettings, SessionState, WorldState, DEFAULT_SCENE,
};
