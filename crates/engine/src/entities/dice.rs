//! Dice entity operations.

use std::sync::Arc;

use chatgm_domain::{roll_ability_scores, AbilityScores, AdvantageMode, DiceError, DiceExpression, RollResult};

use crate::infrastructure::ports::RandomPort;

/// Rolls dice against the injected random source.
pub struct Dice {
    random: Arc<dyn RandomPort>,
}

impl Dice {
    pub fn new(random: Arc<dyn RandomPort>) -> Self {
        Self { random }
    }

    /// Parse `expression` and roll it. Nothing is rolled on a parse error.
    pub fn roll(&self, expression: &str, mode: AdvantageMode) -> Result<RollResult, DiceError> {
        let expression = DiceExpression::parse(expression)?;
        Ok(self.roll_expression(&expression, mode))
    }

    pub fn roll_expression(&self, expression: &DiceExpression, mode: AdvantageMode) -> RollResult {
        let result = expression.roll_with(mode, |sides| self.roll_die(sides));
        tracing::debug!(
            expression = %expression,
            mode = mode.as_str(),
            rolls = ?result.rolls,
            total = result.total,
            "Dice rolled"
        );
        result
    }

    /// Six scores, each "4d6 drop lowest".
    pub fn roll_ability_scores(&self) -> AbilityScores {
        roll_ability_scores(|sides| self.roll_die(sides))
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn pick_index(&self, len: usize) -> usize {
        let max = i32::try_from(len.saturating_sub(1)).unwrap_or(i32::MAX);
        usize::try_from(self.random.gen_range(0, max)).unwrap_or(0)
    }

    fn roll_die(&self, sides: u32) -> u32 {
        let max = i32::try_from(sides).unwrap_or(i32::MAX);
        u32::try_from(self.random.gen_range(1, max)).unwrap_or(1)
    }
}
