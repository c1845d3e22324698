//! Character use cases.

use std::sync::Arc;

mod roll_character;

pub use roll_character::{RollCharacter, RollCharacterError};

/// Container for character use cases.
pub struct CharacterUseCases {
    pub roll: Arc<RollCharacter>,
}

impl CharacterUseCases {
    pub fn new(roll: Arc<RollCharacter>) -> Self {
        Self { roll }
    }
}
