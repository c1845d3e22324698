//! Character collections with a fixed schema per category
//!
//! Each collection keeps insertion order for display but compares as a set,
//! so two characters holding the same items in a different order are equal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Ability, DiceExpression, Skill};
use crate::error::DomainError;

/// Highest spell level; level 0 holds cantrips.
pub const MAX_SPELL_LEVEL: u8 = 9;

// ============================================================================
// InsertionSet
// ============================================================================

/// Ordered, duplicate-free sequence with order-independent equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<T>", into = "Vec<T>")]
#[serde(bound(
    serialize = "T: Serialize + Clone",
    deserialize = "T: Deserialize<'de> + PartialEq"
))]
pub struct InsertionSet<T> {
    items: Vec<T>,
}

impl<T: PartialEq> InsertionSet<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append `item` unless an equal one is present. Returns whether it was added.
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, item: &T) -> bool {
        let before = self.items.len();
        self.items.retain(|existing| existing != item);
        before != self.items.len()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: PartialEq> Default for InsertionSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for InsertionSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len() && self.items.iter().all(|i| other.contains(i))
    }
}

impl<T: Eq> Eq for InsertionSet<T> {}

impl<T: PartialEq> From<Vec<T>> for InsertionSet<T> {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T> From<InsertionSet<T>> for Vec<T> {
    fn from(set: InsertionSet<T>) -> Self {
        set.items
    }
}

impl<T: PartialEq> FromIterator<T> for InsertionSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl<'a, T> IntoIterator for &'a InsertionSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ============================================================================
// Proficiency
// ============================================================================

/// Something a character is trained in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Proficiency {
    Skill(Skill),
    SavingThrow(Ability),
    Tool(String),
    Weapon(String),
    Armor(String),
    Language(String),
}

// ============================================================================
// Equipment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentKind {
    Weapon,
    Armor,
    Shield,
    #[default]
    Gear,
    Tool,
    Consumable,
}

/// An item a character carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentItem {
    pub name: String,
    #[serde(default)]
    pub kind: EquipmentKind,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub equipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<DiceExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armor_bonus: Option<i32>,
}

fn default_quantity() -> u32 {
    1
}

impl EquipmentItem {
    pub fn new(name: impl Into<String>, kind: EquipmentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            quantity: 1,
            equipped: false,
            damage: None,
            armor_bonus: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_damage(mut self, damage: DiceExpression) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn equipped(mut self) -> Self {
        self.equipped = true;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("Equipment name cannot be empty"));
        }
        if self.quantity == 0 {
            return Err(DomainError::validation(format!(
                "Equipment '{}' must have a quantity of at least 1",
                self.name
            )));
        }
        Ok(())
    }

    /// Same item for stacking purposes (case-insensitive name, same kind).
    pub fn stacks_with(&self, other: &EquipmentItem) -> bool {
        self.kind == other.kind && self.name.trim().eq_ignore_ascii_case(other.name.trim())
    }
}

// ============================================================================
// KnownSpells
// ============================================================================

/// Spells partitioned by level 0..=9.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u8, Vec<String>>", into = "BTreeMap<u8, Vec<String>>")]
pub struct KnownSpells {
    by_level: BTreeMap<u8, InsertionSet<String>>,
}

impl KnownSpells {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a spell. Returns whether it was new.
    pub fn learn(&mut self, level: u8, spell: impl Into<String>) -> Result<bool, DomainError> {
        if level > MAX_SPELL_LEVEL {
            return Err(DomainError::validation(format!(
                "Spell level must be between 0 and {}, got {}",
                MAX_SPELL_LEVEL, level
            )));
        }
        let spell = spell.into().trim().to_string();
        if spell.is_empty() {
            return Err(DomainError::validation("Spell name cannot be empty"));
        }
        Ok(self.by_level.entry(level).or_default().insert(spell))
    }

    pub fn at_level(&self, level: u8) -> &[String] {
        self.by_level
            .get(&level)
            .map(InsertionSet::as_slice)
            .unwrap_or(&[])
    }

    pub fn cantrips(&self) -> &[String] {
        self.at_level(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &String)> {
        self.by_level
            .iter()
            .flat_map(|(level, spells)| spells.iter().map(move |s| (*level, s)))
    }

    pub fn len(&self) -> usize {
        self.by_level.values().map(InsertionSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<BTreeMap<u8, Vec<String>>> for KnownSpells {
    type Error = DomainError;

    fn try_from(map: BTreeMap<u8, Vec<String>>) -> Result<Self, Self::Error> {
        let mut spells = Self::new();
        for (level, names) in map {
            for name in names {
                spells.learn(level, name)?;
            }
        }
        Ok(spells)
    }
}

impl From<KnownSpells> for BTreeMap<u8, Vec<String>> {
    fn from(spells: KnownSpells) -> Self {
        spells
            .by_level
            .into_iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(level, set)| (level, set.into()))
            .collect()
    }
}
