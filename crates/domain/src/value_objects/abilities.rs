//! Ability scores, levels and the math derived from them
//!
//! Modifiers and bonuses are pure functions. Nothing here stores a derived
//! value, so they can never drift from the scores they come from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

pub const MIN_ABILITY_SCORE: i32 = 1;
pub const MAX_ABILITY_SCORE: i32 = 30;
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 20;

/// Experience needed to reach each level, indexed by `level - 1`.
pub const EXPERIENCE_THRESHOLDS: [u32; 20] = [
    0, 300, 900, 2_700, 6_500, 14_000, 23_000, 34_000, 48_000, 64_000, 85_000, 100_000, 120_000,
    140_000, 165_000, 195_000, 225_000, 265_000, 305_000, 355_000,
];

/// `floor((score - 10) / 2)`, total over every integer.
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// `2 + floor((level - 1) / 4)`.
pub fn proficiency_bonus(level: i32) -> i32 {
    2 + (level - 1).div_euclid(4)
}

/// Spell save DC: 8 + casting modifier + proficiency.
pub fn spell_save_dc(casting_modifier: i32, proficiency: i32) -> i32 {
    8 + casting_modifier + proficiency
}

pub fn spell_attack_bonus(casting_modifier: i32, proficiency: i32) -> i32 {
    casting_modifier + proficiency
}

/// Level 1 hit points: the full hit die plus CON, never below 1.
pub fn starting_hit_points(hit_die: u32, constitution_modifier: i32) -> i32 {
    (hit_die as i32 + constitution_modifier).max(1)
}

/// Hit points gained on a level-up roll, never below 1.
pub fn level_up_hit_points(roll: u32, constitution_modifier: i32) -> i32 {
    (roll as i32 + constitution_modifier).max(1)
}

/// Highest level whose threshold `experience` reaches.
pub fn level_for_experience(experience: u32) -> u8 {
    EXPERIENCE_THRESHOLDS
        .iter()
        .rposition(|&threshold| experience >= threshold)
        .map_or(MIN_LEVEL, |idx| idx as u8 + 1)
}

/// Experience threshold for `level`, or `None` outside 1..=20.
pub fn experience_for_level(level: u8) -> Option<u32> {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        return None;
    }
    Some(EXPERIENCE_THRESHOLDS[(level - 1) as usize])
}

/// "4d6 drop lowest" for a single score.
pub fn roll_4d6_drop_lowest<F>(mut roll_die: F) -> u8
where
    F: FnMut(u32) -> u32,
{
    let mut dice: [u32; 4] = [0; 4];
    for die in dice.iter_mut() {
        *die = roll_die(6).clamp(1, 6);
    }
    dice.sort_unstable();
    (dice[1] + dice[2] + dice[3]) as u8
}

/// Roll all six scores independently with "4d6 drop lowest".
pub fn roll_ability_scores<F>(mut roll_die: F) -> AbilityScores
where
    F: FnMut(u32) -> u32,
{
    let mut scores = [0u8; 6];
    for score in scores.iter_mut() {
        *score = roll_4d6_drop_lowest(&mut roll_die);
    }
    AbilityScores { scores }
}

// ============================================================================
// Ability
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Constitution,
        Ability::Intelligence,
        Ability::Wisdom,
        Ability::Charisma,
    ];

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::Strength => "STR",
            Self::Dexterity => "DEX",
            Self::Constitution => "CON",
            Self::Intelligence => "INT",
            Self::Wisdom => "WIS",
            Self::Charisma => "CHA",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for Ability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "strength" => Ok(Self::Strength),
            "dex" | "dexterity" => Ok(Self::Dexterity),
            "con" | "constitution" => Ok(Self::Constitution),
            "int" | "intelligence" => Ok(Self::Intelligence),
            "wis" | "wisdom" => Ok(Self::Wisdom),
            "cha" | "charisma" => Ok(Self::Charisma),
            other => Err(DomainError::parse(format!("Unknown ability: {}", other))),
        }
    }
}

// ============================================================================
// AbilityScores
// ============================================================================

/// Six ability scores, each in `1..=30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AbilityScoresRecord", into = "AbilityScoresRecord")]
pub struct AbilityScores {
    scores: [u8; 6],
}

impl AbilityScores {
    /// Create scores in STR, DEX, CON, INT, WIS, CHA order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if any score is outside 1..=30.
    pub fn new(values: [i32; 6]) -> Result<Self, DomainError> {
        let mut scores = [0u8; 6];
        for (ability, (slot, value)) in Ability::ALL.iter().zip(scores.iter_mut().zip(values)) {
            *slot = validate_score(*ability, value)?;
        }
        Ok(Self { scores })
    }

    pub fn get(&self, ability: Ability) -> u8 {
        self.scores[ability.index()]
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability) as i32)
    }

    /// Return a copy with one score replaced.
    pub fn with(&self, ability: Ability, value: i32) -> Result<Self, DomainError> {
        let mut scores = self.scores;
        scores[ability.index()] = validate_score(ability, value)?;
        Ok(Self { scores })
    }

    /// Add `bonus` to one score, saturating at the 1..=30 bounds.
    pub fn with_bonus(&self, ability: Ability, bonus: i32) -> Self {
        let mut scores = self.scores;
        let raised = (scores[ability.index()] as i32 + bonus).clamp(MIN_ABILITY_SCORE, MAX_ABILITY_SCORE);
        scores[ability.index()] = raised as u8;
        Self { scores }
    }

    pub fn as_array(&self) -> [u8; 6] {
        self.scores
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ability, u8)> + '_ {
        Ability::ALL.iter().map(move |a| (*a, self.get(*a)))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self { scores: [10; 6] }
    }
}

fn validate_score(ability: Ability, value: i32) -> Result<u8, DomainError> {
    if !(MIN_ABILITY_SCORE..=MAX_ABILITY_SCORE).contains(&value) {
        return Err(DomainError::validation(format!(
            "{} must be between {} and {}, got {}",
            ability, MIN_ABILITY_SCORE, MAX_ABILITY_SCORE, value
        )));
    }
    Ok(value as u8)
}

/// Wire shape of [`AbilityScores`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct AbilityScoresRecord {
    strength: i32,
    dexterity: i32,
    constitution: i32,
    intelligence: i32,
    wisdom: i32,
    charisma: i32,
}

impl TryFrom<AbilityScoresRecord> for AbilityScores {
    type Error = DomainError;

    fn try_from(r: AbilityScoresRecord) -> Result<Self, Self::Error> {
        Self::new([
            r.strength,
            r.dexterity,
            r.constitution,
            r.intelligence,
            r.wisdom,
            r.charisma,
        ])
    }
}

impl From<AbilityScores> for AbilityScoresRecord {
    fn from(s: AbilityScores) -> Self {
        let [strength, dexterity, constitution, intelligence, wisdom, charisma] =
            s.scores.map(i32::from);
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }
}

// ============================================================================
// Level
// ============================================================================

/// A character level in `1..=20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Level(u8);

impl Level {
    pub const MIN: Level = Level(MIN_LEVEL);
    pub const MAX: Level = Level(MAX_LEVEL);

    pub fn new(value: i32) -> Result<Self, DomainError> {
        if !(MIN_LEVEL as i32..=MAX_LEVEL as i32).contains(&value) {
            return Err(DomainError::validation(format!(
                "Level must be between {} and {}, got {}",
                MIN_LEVEL, MAX_LEVEL, value
            )));
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_max(&self) -> bool {
        self.0 >= MAX_LEVEL
    }

    /// The following level, or `None` at level 20.
    pub fn next(&self) -> Option<Level> {
        (!self.is_max()).then(|| Level(self.0 + 1))
    }

    pub fn proficiency_bonus(&self) -> i32 {
        proficiency_bonus(self.0 as i32)
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for Level {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Level> for i32 {
    fn from(level: Level) -> i32 {
        level.0 as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ability_modifier_spot_values() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(19), 4);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(1), -5);
        assert_eq!(ability_modifier(30), 10);
    }

    #[test]
    fn test_ability_modifier_matches_floor_over_range() {
        for score in -5..=40 {
            let expected = ((score as f64 - 10.0) / 2.0).floor() as i32;
            assert_eq!(ability_modifier(score), expected, "score {score}");
        }
    }

    #[test]
    fn test_proficiency_bonus() {
        assert_eq!(proficiency_bonus(1), 2);
        assert_eq!(proficiency_bonus(4), 2);
        assert_eq!(proficiency_bonus(5), 3);
        assert_eq!(proficiency_bonus(9), 4);
        assert_eq!(proficiency_bonus(20), 6);
        for level in 1..=20 {
            assert_eq!(proficiency_bonus(level), 2 + (level - 1) / 4);
        }
    }

    #[test]
    fn test_spell_math() {
        assert_eq!(spell_save_dc(3, 2), 13);
        assert_eq!(spell_attack_bonus(3, 2), 5);
    }

    #[test]
    fn test_hit_point_floors() {
        assert_eq!(starting_hit_points(12, 2), 14);
        assert_eq!(starting_hit_points(6, -5), 1);
        assert_eq!(level_up_hit_points(1, -3), 1);
    }

    #[test]
    fn test_level_for_experience() {
        assert_eq!(level_for_experience(0), 1);
        assert_eq!(level_for_experience(299), 1);
        assert_eq!(level_for_experience(300), 2);
        assert_eq!(level_for_experience(6_500), 5);
        assert_eq!(level_for_experience(355_000), 20);
        assert_eq!(level_for_experience(u32::MAX), 20);
        assert_eq!(experience_for_level(3), Some(900));
        assert_eq!(experience_for_level(21), None);
    }

    #[test]
    fn test_roll_4d6_drop_lowest() {
        let mut faces = [1, 6, 4, 3].into_iter();
        assert_eq!(roll_4d6_drop_lowest(|_| faces.next().unwrap_or(1)), 13);
    }

    #[test]
    fn test_roll_ability_scores_independent_per_ability() {
        let mut faces = (0..24).map(|i| (i % 6) as u32 + 1);
        let scores = roll_ability_scores(|_| faces.next().unwrap_or(1));
        // 1,2,3,4 -> 9 ; 5,6,1,2 -> 13 ; 3,4,5,6 -> 15 ; repeats
        assert_eq!(scores.as_array(), [9, 13, 15, 9, 13, 15]);
    }

    #[test]
    fn test_ability_scores_validation() {
        assert!(AbilityScores::new([10, 12, 14, 8, 13, 30]).is_ok());
        let err = AbilityScores::new([10, 0, 14, 8, 13, 15]).unwrap_err();
        assert!(err.to_string().contains("DEX"));
        assert!(AbilityScores::new([31, 10, 10, 10, 10, 10]).is_err());
    }

    #[test]
    fn test_ability_scores_bonus_saturates() {
        let scores = AbilityScores::new([29, 1, 10, 10, 10, 10]).unwrap();
        let raised = scores.with_bonus(Ability::Strength, 2).with_bonus(Ability::Dexterity, -3);
        assert_eq!(raised.get(Ability::Strength), 30);
        assert_eq!(raised.get(Ability::Dexterity), 1);
    }

    #[test]
    fn test_ability_scores_serde_rejects_out_of_range() {
        let json = r#"{"strength":10,"dexterity":10,"constitution":10,"intelligence":10,"wisdom":10,"charisma":40}"#;
        assert!(serde_json::from_str::<AbilityScores>(json).is_err());

        let scores = AbilityScores::new([8, 9, 10, 11, 12, 13]).unwrap();
        let back: AbilityScores =
            serde_json::from_str(&serde_json::to_string(&scores).unwrap()).unwrap();
        assert_eq!(back, scores);
    }

    #[test]
    fn test_level_bounds() {
        assert!(Level::new(0).is_err());
        assert!(Level::new(21).is_err());
        assert_eq!(Level::new(20).unwrap().next(), None);
        assert_eq!(Level::new(4).unwrap().next().map(|l| l.value()), Some(5));
    }
}
