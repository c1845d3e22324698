//! Closed enumerations a character is built from
//!
//! Parsing is lenient about case and separators ("half-elf", "Half Elf",
//! "half_elf") but never accepts a value outside the list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Ability, AbilityScores};
use crate::error::DomainError;

fn normalize_key(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

// ============================================================================
// Race
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Race {
    Human,
    Elf,
    Dwarf,
    Halfling,
    Dragonborn,
    Gnome,
    HalfElf,
    HalfOrc,
    Tiefling,
}

impl Race {
    pub const ALL: [Race; 9] = [
        Race::Human,
        Race::Elf,
        Race::Dwarf,
        Race::Halfling,
        Race::Dragonborn,
        Race::Gnome,
        Race::HalfElf,
        Race::HalfOrc,
        Race::Tiefling,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Human => "Human",
            Self::Elf => "Elf",
            Self::Dwarf => "Dwarf",
            Self::Halfling => "Halfling",
            Self::Dragonborn => "Dragonborn",
            Self::Gnome => "Gnome",
            Self::HalfElf => "Half-Elf",
            Self::HalfOrc => "Half-Orc",
            Self::Tiefling => "Tiefling",
        }
    }

    /// Ability score increases granted by the race.
    pub fn ability_bonuses(&self) -> &'static [(Ability, i32)] {
        use Ability::*;
        match self {
            Self::Human => &[
                (Strength, 1),
                (Dexterity, 1),
                (Constitution, 1),
                (Intelligence, 1),
                (Wisdom, 1),
                (Charisma, 1),
            ],
            Self::Elf => &[(Dexterity, 2)],
            Self::Dwarf => &[(Constitution, 2)],
            Self::Halfling => &[(Dexterity, 2)],
            Self::Dragonborn => &[(Strength, 2), (Charisma, 1)],
            Self::Gnome => &[(Intelligence, 2)],
            Self::HalfElf => &[(Charisma, 2)],
            Self::HalfOrc => &[(Strength, 2), (Constitution, 1)],
            Self::Tiefling => &[(Charisma, 2), (Intelligence, 1)],
        }
    }

    /// Raise `scores` by this race's bonuses, capped at 30.
    pub fn apply_bonuses(&self, scores: AbilityScores) -> AbilityScores {
        self.ability_bonuses()
            .iter()
            .fold(scores, |acc, (ability, bonus)| acc.with_bonus(*ability, *bonus))
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Race {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        Self::ALL
            .into_iter()
            .find(|race| normalize_key(race.display_name()) == key)
            .ok_or_else(|| DomainError::validation(format!("Unknown race: {}", s.trim())))
    }
}

// ============================================================================
// CharacterClass
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 12] = [
        CharacterClass::Barbarian,
        CharacterClass::Bard,
        CharacterClass::Cleric,
        CharacterClass::Druid,
        CharacterClass::Fighter,
        CharacterClass::Monk,
        CharacterClass::Paladin,
        CharacterClass::Ranger,
        CharacterClass::Rogue,
        CharacterClass::Sorcerer,
        CharacterClass::Warlock,
        CharacterClass::Wizard,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Barbarian => "Barbarian",
            Self::Bard => "Bard",
            Self::Cleric => "Cleric",
            Self::Druid => "Druid",
            Self::Fighter => "Fighter",
            Self::Monk => "Monk",
            Self::Paladin => "Paladin",
            Self::Ranger => "Ranger",
            Self::Rogue => "Rogue",
            Self::Sorcerer => "Sorcerer",
            Self::Warlock => "Warlock",
            Self::Wizard => "Wizard",
        }
    }

    pub fn hit_die(&self) -> u32 {
        match self {
            Self::Barbarian => 12,
            Self::Fighter | Self::Paladin | Self::Ranger => 10,
            Self::Sorcerer | Self::Wizard => 6,
            _ => 8,
        }
    }

    /// Casting ability for full and pact casters; `None` for martial classes.
    pub fn spellcasting_ability(&self) -> Option<Ability> {
        match self {
            Self::Wizard => Some(Ability::Intelligence),
            Self::Cleric | Self::Druid | Self::Ranger => Some(Ability::Wisdom),
            Self::Bard | Self::Paladin | Self::Sorcerer | Self::Warlock => Some(Ability::Charisma),
            _ => None,
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for CharacterClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        Self::ALL
            .into_iter()
            .find(|class| normalize_key(class.display_name()) == key)
            .ok_or_else(|| DomainError::validation(format!("Unknown class: {}", s.trim())))
    }
}

// ============================================================================
// Alignment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    LawfulGood,
    NeutralGood,
    ChaoticGood,
    LawfulNeutral,
    TrueNeutral,
    ChaoticNeutral,
    LawfulEvil,
    NeutralEvil,
    ChaoticEvil,
}

impl Alignment {
    pub const ALL: [Alignment; 9] = [
        Alignment::LawfulGood,
        Alignment::NeutralGood,
        Alignment::ChaoticGood,
        Alignment::LawfulNeutral,
        Alignment::TrueNeutral,
        Alignment::ChaoticNeutral,
        Alignment::LawfulEvil,
        Alignment::NeutralEvil,
        Alignment::ChaoticEvil,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LawfulGood => "Lawful Good",
            Self::NeutralGood => "Neutral Good",
            Self::ChaoticGood => "Chaotic Good",
            Self::LawfulNeutral => "Lawful Neutral",
            Self::TrueNeutral => "True Neutral",
            Self::ChaoticNeutral => "Chaotic Neutral",
            Self::LawfulEvil => "Lawful Evil",
            Self::NeutralEvil => "Neutral Evil",
            Self::ChaoticEvil => "Chaotic Evil",
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Alignment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        if key == "neutral" {
            return Ok(Self::TrueNeutral);
        }
        Self::ALL
            .into_iter()
            .find(|a| normalize_key(a.display_name()) == key)
            .ok_or_else(|| DomainError::validation(format!("Unknown alignment: {}", s.trim())))
    }
}

// ============================================================================
// Skill
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Acrobatics,
    AnimalHandling,
    Arcana,
    Athletics,
    Deception,
    History,
    Insight,
    Intimidation,
    Investigation,
    Medicine,
    Nature,
    Perception,
    Performance,
    Persuasion,
    Religion,
    SleightOfHand,
    Stealth,
    Survival,
}

impl Skill {
    pub const ALL: [Skill; 18] = [
        Skill::Acrobatics,
        Skill::AnimalHandling,
        Skill::Arcana,
        Skill::Athletics,
        Skill::Deception,
        Skill::History,
        Skill::Insight,
        Skill::Intimidation,
        Skill::Investigation,
        Skill::Medicine,
        Skill::Nature,
        Skill::Perception,
        Skill::Performance,
        Skill::Persuasion,
        Skill::Religion,
        Skill::SleightOfHand,
        Skill::Stealth,
        Skill::Survival,
    ];

    /// The ability a skill check adds.
    pub fn ability(&self) -> Ability {
        match self {
            Self::Athletics => Ability::Strength,
            Self::Acrobatics | Self::SleightOfHand | Self::Stealth => Ability::Dexterity,
            Self::Arcana | Self::History | Self::Investigation | Self::Nature | Self::Religion => {
                Ability::Intelligence
            }
            Self::AnimalHandling
            | Self::Insight
            | Self::Medicine
            | Self::Perception
            | Self::Survival => Ability::Wisdom,
            Self::Deception | Self::Intimidation | Self::Performance | Self::Persuasion => {
                Ability::Charisma
            }
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Acrobatics => "Acrobatics",
            Self::AnimalHandling => "Animal Handling",
            Self::Arcana => "Arcana",
            Self::Athletics => "Athletics",
            Self::Deception => "Deception",
            Self::History => "History",
            Self::Insight => "Insight",
            Self::Intimidation => "Intimidation",
            Self::Investigation => "Investigation",
            Self::Medicine => "Medicine",
            Self::Nature => "Nature",
            Self::Perception => "Perception",
            Self::Performance => "Performance",
            Self::Persuasion => "Persuasion",
            Self::Religion => "Religion",
            Self::SleightOfHand => "Sleight of Hand",
            Self::Stealth => "Stealth",
            Self::Survival => "Survival",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Skill {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        Self::ALL
            .into_iter()
            .find(|skill| normalize_key(skill.display_name()) == key)
            .ok_or_else(|| DomainError::validation(format!("Unknown skill: {}", s.trim())))
    }
}
