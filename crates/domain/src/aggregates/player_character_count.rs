//! PlayerCharacterCount aggregate - how many active characters a player owns
//!
//! Tracked as its own record and updated in the same write as character
//! creation or hard deletion, so the limit never depends on a live count.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Default per-player limit on active characters.
pub const DEFAULT_MAX_CHARACTERS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerCharacterCount {
    player_id: String,
    active_count: u32,
    max_allowed: u32,
}

impl PlayerCharacterCount {
    pub fn new(player_id: impl Into<String>, max_allowed: u32) -> Self {
        Self {
            player_id: player_id.into(),
            active_count: 0,
            max_allowed,
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn active_count(&self) -> u32 {
        self.active_count
    }

    pub fn max_allowed(&self) -> u32 {
        self.max_allowed
    }

    pub fn can_create(&self) -> bool {
        self.active_count < self.max_allowed
    }

    pub fn remaining_slots(&self) -> u32 {
        self.max_allowed.saturating_sub(self.active_count)
    }

    /// Limits are configuration; a lowered limit never evicts existing characters.
    pub fn set_max_allowed(&mut self, max_allowed: u32) {
        self.max_allowed = max_allowed;
    }

    /// Reserve a slot for a new character.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::LimitReached` when no slot is free; the count
    /// is unchanged.
    pub fn increment(&mut self) -> Result<(), DomainError> {
        if !self.can_create() {
            return Err(DomainError::limit_reached(self.active_count, self.max_allowed));
        }
        self.active_count += 1;
        Ok(())
    }

    /// Release a slot. Saturates at zero.
    pub fn decrement(&mut self) {
        self.active_count = self.active_count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_up_to_limit() {
        let mut count = PlayerCharacterCount::new("p1", 3);
        for _ in 0..3 {
            count.increment().unwrap();
        }
        assert!(!count.can_create());
        assert_eq!(count.remaining_slots(), 0);

        let err = count.increment().unwrap_err();
        assert_eq!(err, DomainError::limit_reached(3, 3));
        assert_eq!(count.active_count(), 3);
    }

    #[test]
    fn decrement_frees_a_slot_and_saturates() {
        let mut count = PlayerCharacterCount::new("p1", 1);
        count.increment().unwrap();
        count.decrement();
        count.decrement();
        assert_eq!(count.active_count(), 0);
        assert_eq!(count.remaining_slots(), 1);
    }
}
