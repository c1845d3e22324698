//! Value objects: immutable, validated building blocks of the aggregates.

mod abilities;
mod character_options;
mod collections;
mod dice;
mod names;

pub use abilities::{
    ability_modifier, experience_for_level, level_for_experience, level_up_hit_points,
    proficiency_bonus, roll_4d6_drop_lowest, roll_ability_scores, spell_attack_bonus,
    spell_save_dc, starting_hit_points, Ability, AbilityScores, Level, EXPERIENCE_THRESHOLDS,
    MAX_ABILITY_SCORE, MAX_LEVEL, MIN_ABILITY_SCORE, MIN_LEVEL,
};
pub use character_options::{Alignment, CharacterClass, Race, Skill};
pub use collections::{
    EquipmentItem, EquipmentKind, InsertionSet, KnownSpells, Proficiency, MAX_SPELL_LEVEL,
};
pub use dice::{
    AdvantageMode, DiceError, DiceExpression, RollResult, MAX_DICE_COUNT, STANDARD_DIE_SIZES,
};
pub use names::{
    name_format_errors, name_key, sanitize_name, CharacterName, MAX_NAME_LENGTH,
    MIN_NAME_LENGTH, RESERVED_NAMES,
};
