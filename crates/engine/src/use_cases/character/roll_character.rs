//! Random character generation.
//!
//! A rolled character goes through the same create path as a hand-made one,
//! so every uniqueness rule and the player limit still apply.

use std::collections::BTreeMap;
use std::sync::Arc;

use chatgm_domain::{
    Character, CharacterClass, CharacterDraft, DiceExpression, EquipmentItem, EquipmentKind,
    ErrorCode, Proficiency, Race, SessionId, Skill,
};

use crate::entities::{self, CharacterError, Dice};

/// Create attempts before giving up on collisions.
const MAX_ROLL_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RollCharacterError {
    #[error(transparent)]
    Character(#[from] CharacterError),
}

impl ErrorCode for RollCharacterError {
    fn code(&self) -> &'static str {
        match self {
            Self::Character(e) => e.code(),
        }
    }
}

/// Use case for rolling a random character.
pub struct RollCharacter {
    character: Arc<entities::Character>,
    dice: Arc<Dice>,
}

impl RollCharacter {
    pub fn new(character: Arc<entities::Character>, dice: Arc<Dice>) -> Self {
        Self { character, dice }
    }

    /// Roll race, class, abilities and name, then create the character.
    ///
    /// A taken name is replaced by the first free suggestion and a taken
    /// class/race pair is rerolled; other errors are returned as is.
    pub async fn execute(
        &self,
        player_id: &str,
        session_id: SessionId,
    ) -> Result<Character, RollCharacterError> {
        let (mut race, mut class) = self.roll_pair();
        let mut name = self.roll_name(race);
        let mut last_error = None;

        for attempt in 1..=MAX_ROLL_ATTEMPTS {
            let draft = self.draft(&name, race, class);
            match self.character.create(player_id, session_id, &draft).await {
                Ok(character) => return Ok(character),
                Err(CharacterError::DuplicateName { name: taken, suggestions }) => {
                    tracing::debug!(attempt, name = %taken, "Rolled name taken");
                    name = match suggestions.first() {
                        Some(free) => free.clone(),
                        None => self.roll_name(race),
                    };
                    last_error = Some(CharacterError::DuplicateName { name: taken, suggestions });
                }
                Err(e @ CharacterError::DuplicateClassRace { .. }) => {
                    tracing::debug!(attempt, race = %race, class = %class, "Rolled class and race taken");
                    let previous_race = race;
                    (race, class) = self.roll_pair();
                    if race != previous_race {
                        name = self.roll_name(race);
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(player_id = %player_id, attempts = MAX_ROLL_ATTEMPTS, "Could not roll a free character");
        Err(last_error
            .unwrap_or_else(|| CharacterError::Validation("no character rolled".to_string()))
            .into())
    }

    fn roll_pair(&self) -> (Race, CharacterClass) {
        let race = Race::ALL[self.dice.pick_index(Race::ALL.len())];
        let class = CharacterClass::ALL[self.dice.pick_index(CharacterClass::ALL.len())];
        (race, class)
    }

    fn roll_name(&self, race: Race) -> String {
        let pool = names_for(race);
        pool[self.dice.pick_index(pool.len())].to_string()
    }

    fn draft(&self, name: &str, race: Race, class: CharacterClass) -> CharacterDraft {
        let scores = race.apply_bonuses(self.dice.roll_ability_scores());
        let (proficiencies, equipment, spells) = starting_kit(class);
        CharacterDraft {
            abilities: Some(scores.as_array().map(i32::from)),
            proficiencies,
            equipment,
            spells,
            ..CharacterDraft::new(name, race.display_name(), class.display_name())
        }
    }
}

fn names_for(race: Race) -> &'static [&'static str] {
    match race {
        Race::Human => &["Aelar", "Beiro", "Carric", "Drannor", "Enna", "Fodel", "Galar", "Halimath"],
        Race::Elf => &["Adran", "Aelar", "Aramil", "Aranea", "Berrian", "Dayereth", "Enna", "Galinndan"],
        Race::Dwarf => &["Adrik", "Alberich", "Baern", "Balin", "Beira", "Darrak", "Delg", "Eberk"],
        Race::Halfling => &["Alton", "Ander", "Cade", "Corrin", "Eldon", "Errich", "Finnan", "Garret"],
        Race::Dragonborn => &["Arjhan", "Balasar", "Bharash", "Donaar", "Ghesh", "Heskan", "Kriv", "Medrash"],
        Race::Gnome => &["Alston", "Alvyn", "Boddynock", "Brocc", "Burgell", "Dimble", "Eldon", "Erky"],
        Race::HalfElf => &["Aerdyl", "Ahvak", "Aramil", "Aranea", "Berrian", "Caelynn", "Carric", "Dayereth"],
        Race::HalfOrc => &["Dench", "Feng", "Gell", "Henk", "Holg", "Imsh", "Keth", "Krusk"],
        Race::Tiefling => &["Akmenos", "Amnon", "Barakas", "Damakos", "Ekemon", "Iados", "Kairon", "Leucis"],
    }
}

fn weapon(name: &str, damage: &str) -> EquipmentItem {
    EquipmentItem {
        damage: DiceExpression::parse(damage).ok(),
        ..EquipmentItem::new(name, EquipmentKind::Weapon)
    }
}

type StartingKit = (Vec<Proficiency>, Vec<EquipmentItem>, BTreeMap<u8, Vec<String>>);

/// Class proficiencies, gear and spells. Classes without a kit start empty.
fn starting_kit(class: CharacterClass) -> StartingKit {
    match class {
        CharacterClass::Fighter => (
            vec![Proficiency::Skill(Skill::Athletics), Proficiency::Skill(Skill::Intimidation)],
            vec![
                EquipmentItem::new("Leather Armor", EquipmentKind::Armor).equipped(),
                weapon("Longsword", "1d8").equipped(),
                EquipmentItem::new("Shield", EquipmentKind::Shield).equipped(),
                weapon("Javelin", "1d6"),
            ],
            BTreeMap::new(),
        ),
        CharacterClass::Wizard => (
            vec![Proficiency::Skill(Skill::Arcana), Proficiency::Skill(Skill::Investigation)],
            vec![
                weapon("Quarterstaff", "1d6"),
                weapon("Light Crossbow", "1d8"),
                EquipmentItem::new("Spellbook", EquipmentKind::Gear),
            ],
            BTreeMap::from([
                (0, vec!["Mage Hand".to_string(), "Prestidigitation".to_string()]),
                (1, vec!["Magic Missile".to_string(), "Shield".to_string()]),
            ]),
        ),
        CharacterClass::Rogue => (
            vec![
                Proficiency::Skill(Skill::Stealth),
                Proficiency::Skill(Skill::SleightOfHand),
                Proficiency::Tool("Thieves' Tools".to_string()),
            ],
            vec![
                EquipmentItem::new("Leather Armor", EquipmentKind::Armor).equipped(),
                weapon("Shortsword", "1d6"),
                EquipmentItem::new("Thieves' Tools", EquipmentKind::Tool),
                weapon("Dagger", "1d4"),
            ],
            BTreeMap::new(),
        ),
        _ => (Vec::new(), Vec::new(), BTreeMap::new()),
    }
}
