//! Dice expressions and roll resolution
//!
//! Supports expressions like "1d20+5", "2d6-1", "d100". Only the standard
//! polyhedral sizes are accepted. Randomness is injected as a closure so the
//! domain stays free of any RNG dependency.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ErrorCode;

/// Die sizes accepted by the parser.
pub const STANDARD_DIE_SIZES: [u32; 7] = [4, 6, 8, 10, 12, 20, 100];

/// Upper bound on the number of dice in one expression.
pub const MAX_DICE_COUNT: u32 = 100;

/// Error when parsing a dice expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    /// The expression string is empty
    #[error("Empty dice expression")]
    Empty,
    /// Invalid format - expected [count]d<sides>[+/-modifier]
    #[error("Invalid dice format: {0}")]
    InvalidFormat(String),
    /// Dice count outside 1..=100
    #[error("Dice count must be between 1 and {max}, got {0}", max = MAX_DICE_COUNT)]
    InvalidDiceCount(u32),
    /// Die size is not one of the standard sizes
    #[error("Unsupported die size d{0} (allowed: d4, d6, d8, d10, d12, d20, d100)")]
    UnsupportedDieSize(u32),
    /// Modifier overflow
    #[error("Modifier value overflow")]
    ModifierOverflow,
}

impl ErrorCode for DiceError {
    fn code(&self) -> &'static str {
        "invalid_dice_expression"
    }
}

/// How a single d20 is rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvantageMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl AdvantageMode {
    /// Combine two sources of advantage state. Advantage and disadvantage cancel.
    pub fn combine(self, other: AdvantageMode) -> AdvantageMode {
        match (self, other) {
            (Self::Normal, mode) | (mode, Self::Normal) => mode,
            (Self::Advantage, Self::Advantage) => Self::Advantage,
            (Self::Disadvantage, Self::Disadvantage) => Self::Disadvantage,
            _ => Self::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Advantage => "advantage",
            Self::Disadvantage => "disadvantage",
        }
    }
}

impl FromStr for AdvantageMode {
    type Err = crate::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "normal" => Ok(Self::Normal),
            "adv" | "advantage" => Ok(Self::Advantage),
            "dis" | "disadv" | "disadvantage" => Ok(Self::Disadvantage),
            other => Err(crate::error::DomainError::parse(format!(
                "Unknown advantage mode: {}",
                other
            ))),
        }
    }
}

/// A parsed dice expression like "2d6+3"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceExpression {
    count: u32,
    sides: u32,
    modifier: i32,
}

impl DiceExpression {
    /// Create a new dice expression from already-separated parts.
    pub fn new(count: u32, sides: u32, modifier: i32) -> Result<Self, DiceError> {
        if count == 0 || count > MAX_DICE_COUNT {
            return Err(DiceError::InvalidDiceCount(count));
        }
        if !STANDARD_DIE_SIZES.contains(&sides) {
            return Err(DiceError::UnsupportedDieSize(sides));
        }
        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    /// Parse an expression string like "1d20+5", "2d6-1", "d100".
    ///
    /// Parsing is case-insensitive and ignores all whitespace. A missing
    /// count means one die.
    pub fn parse(input: &str) -> Result<Self, DiceError> {
        let input: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if input.is_empty() {
            return Err(DiceError::Empty);
        }

        let d_pos = input.find('d').ok_or_else(|| {
            DiceError::InvalidFormat(format!("Missing 'd' separator in '{}'", input))
        })?;

        let count_str = &input[..d_pos];
        let count = if count_str.is_empty() {
            1
        } else {
            parse_digits(count_str)
                .ok_or_else(|| DiceError::InvalidFormat(format!("Invalid dice count: '{}'", count_str)))?
        };

        let after_d = &input[d_pos + 1..];
        let (sides_str, modifier) = match after_d.find(['+', '-']) {
            Some(sign_pos) => {
                let magnitude_str = &after_d[sign_pos + 1..];
                if magnitude_str.is_empty() || !magnitude_str.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(DiceError::InvalidFormat(format!(
                        "Invalid modifier: '{}'",
                        &after_d[sign_pos..]
                    )));
                }
                let magnitude: i32 = magnitude_str
                    .parse()
                    .map_err(|_| DiceError::ModifierOverflow)?;
                let modifier = if after_d[sign_pos..].starts_with('-') {
                    -magnitude
                } else {
                    magnitude
                };
                (&after_d[..sign_pos], modifier)
            }
            None => (after_d, 0),
        };

        let sides = parse_digits(sides_str)
            .ok_or_else(|| DiceError::InvalidFormat(format!("Invalid die size: '{}'", sides_str)))?;

        Self::new(count, sides, modifier)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn sides(&self) -> u32 {
        self.sides
    }

    pub fn modifier(&self) -> i32 {
        self.modifier
    }

    /// Whether this expression is exactly one d20 (the only shape advantage applies to).
    pub fn is_single_d20(&self) -> bool {
        self.count == 1 && self.sides == 20
    }

    /// Get the minimum possible total
    pub fn min_total(&self) -> i32 {
        (self.count as i32).saturating_add(self.modifier)
    }

    /// Get the maximum possible total
    pub fn max_total(&self) -> i32 {
        ((self.count * self.sides) as i32).saturating_add(self.modifier)
    }

    /// Roll the expression using `roll_die`, which receives the die size and
    /// returns a face in `1..=sides`. Out-of-range faces are clamped.
    ///
    /// Advantage and disadvantage only affect a single d20; for any other
    /// shape the mode is recorded but ignored.
    pub fn roll_with<F>(&self, mode: AdvantageMode, mut roll_die: F) -> RollResult
    where
        F: FnMut(u32) -> u32,
    {
        let sides = self.sides;
        let mut face = move || roll_die(sides).clamp(1, sides);

        let (rolls, discarded) = if self.is_single_d20() && mode != AdvantageMode::Normal {
            let first = face();
            let second = face();
            let (kept, other) = match mode {
                AdvantageMode::Advantage => (first.max(second), first.min(second)),
                _ => (first.min(second), first.max(second)),
            };
            (vec![kept], Some(other))
        } else {
            ((0..self.count).map(|_| face()).collect::<Vec<_>>(), None)
        };

        let dice_total: u32 = rolls.iter().sum();
        let total = (dice_total as i32).saturating_add(self.modifier);
        let natural = if self.is_single_d20() {
            rolls.first().copied()
        } else {
            None
        };

        RollResult {
            expression: *self,
            mode,
            rolls,
            discarded,
            modifier: self.modifier,
            total,
            is_critical: natural == Some(20),
            is_fumble: natural == Some(1),
        }
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            0 => write!(f, "{}d{}", self.count, self.sides),
            m if m > 0 => write!(f, "{}d{}+{}", self.count, self.sides, m),
            m => write!(f, "{}d{}{}", self.count, self.sides, m),
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DiceExpression {
    type Error = DiceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DiceExpression> for String {
    fn from(expr: DiceExpression) -> String {
        expr.to_string()
    }
}

/// Result of rolling a dice expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    /// The expression that was rolled
    pub expression: DiceExpression,
    /// Advantage mode requested by the caller
    pub mode: AdvantageMode,
    /// Die values used in the kept outcome
    pub rolls: Vec<u32>,
    /// The d20 thrown away under advantage or disadvantage
    pub discarded: Option<u32>,
    /// Modifier that was applied
    pub modifier: i32,
    /// Final total (sum of kept dice + modifier)
    pub total: i32,
    /// Natural 20 on a single kept d20
    pub is_critical: bool,
    /// Natural 1 on a single kept d20
    pub is_fumble: bool,
}

impl RollResult {
    /// Sum of kept dice before the modifier
    pub fn dice_total(&self) -> u32 {
        self.rolls.iter().sum()
    }

    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }

    /// Format as a breakdown string (e.g., "1d20 [17] (dropped 3) + 5 = 22")
    pub fn breakdown(&self) -> String {
        let rolls = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = format!(
            "{}d{} [{}]",
            self.expression.count(),
            self.expression.sides(),
            rolls
        );
        if let Some(dropped) = self.discarded {
            out.push_str(&format!(" (dropped {})", dropped));
        }
        match self.modifier {
            0 => {}
            m if m > 0 => out.push_str(&format!(" + {}", m)),
            m => out.push_str(&format!(" - {}", -(m as i64))),
        }
        out.push_str(&format!(" = {}", self.total));
        if self.is_critical {
            out.push_str(" (critical!)");
        } else if self.is_fumble {
            out.push_str(" (fumble!)");
        }
        out
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.breakdown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(values: &[u32]) -> impl FnMut(u32) -> u32 + '_ {
        let mut iter = values.iter().copied();
        move |_| iter.next().unwrap_or(1)
    }

    #[test]
    fn test_parse_simple_d20() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.count(), 1);
        assert_eq!(expr.sides(), 20);
        assert_eq!(expr.modifier(), 0);
    }

    #[test]
    fn test_parse_shorthand_d20() {
        let expr = DiceExpression::parse("d20").unwrap();
        assert_eq!(expr.count(), 1);
        assert!(expr.is_single_d20());
    }

    #[test]
    fn test_parse_with_modifiers() {
        assert_eq!(DiceExpression::parse("2d6+3").unwrap().modifier(), 3);
        assert_eq!(DiceExpression::parse("2d6-1").unwrap().modifier(), -1);
    }

    #[test]
    fn test_parse_case_and_whitespace_insensitive() {
        let expr = DiceExpression::parse("  2 D 8 + 4 ").unwrap();
        assert_eq!(expr, DiceExpression::new(2, 8, 4).unwrap());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(DiceExpression::parse("   "), Err(DiceError::Empty));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["20", "1d", "xd6", "1d6+", "1d6+-2", "1d6d6", "-1d6", "1d6+2+3", "1.5d6"] {
            assert!(
                matches!(DiceExpression::parse(input), Err(DiceError::InvalidFormat(_))),
                "expected InvalidFormat for {input}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_count_out_of_range() {
        assert_eq!(
            DiceExpression::parse("0d6"),
            Err(DiceError::InvalidDiceCount(0))
        );
        assert_eq!(
            DiceExpression::parse("101d6"),
            Err(DiceError::InvalidDiceCount(101))
        );
        assert!(DiceExpression::parse("100d6").is_ok());
    }

    #[test]
    fn test_parse_rejects_non_standard_die() {
        assert_eq!(
            DiceExpression::parse("1d7"),
            Err(DiceError::UnsupportedDieSize(7))
        );
        assert_eq!(
            DiceExpression::parse("3d3"),
            Err(DiceError::UnsupportedDieSize(3))
        );
    }

    #[test]
    fn test_parse_modifier_overflow() {
        assert_eq!(
            DiceExpression::parse("1d20+99999999999"),
            Err(DiceError::ModifierOverflow)
        );
    }

    #[test]
    fn test_roll_two_d6_plus_three() {
        let expr = DiceExpression::parse("2d6+3").unwrap();
        let result = expr.roll_with(AdvantageMode::Normal, sequence(&[4, 5]));
        assert_eq!(result.rolls, vec![4, 5]);
        assert_eq!(result.modifier, 3);
        assert_eq!(result.total, 12);
        assert!(!result.is_critical);
        assert!(!result.is_fumble);
    }

    #[test]
    fn test_advantage_keeps_higher() {
        let expr = DiceExpression::parse("1d20").unwrap();
        let result = expr.roll_with(AdvantageMode::Advantage, sequence(&[3, 17]));
        assert_eq!(result.rolls, vec![17]);
        assert_eq!(result.discarded, Some(3));
        assert_eq!(result.total, 17);
        assert!(!result.is_critical);
    }

    #[test]
    fn test_disadvantage_keeps_lower() {
        let expr = DiceExpression::parse("1d20+2").unwrap();
        let result = expr.roll_with(AdvantageMode::Disadvantage, sequence(&[3, 17]));
        assert_eq!(result.rolls, vec![3]);
        assert_eq!(result.total, 5);
    }

    #[test]
    fn test_advantage_fumble_requires_both_ones() {
        let expr = DiceExpression::parse("d20").unwrap();
        let one_low = expr.roll_with(AdvantageMode::Advantage, sequence(&[1, 12]));
        assert!(!one_low.is_fumble);

        let both_low = expr.roll_with(AdvantageMode::Advantage, sequence(&[1, 1]));
        assert!(both_low.is_fumble);
    }

    #[test]
    fn test_disadvantage_critical_requires_both_twenties() {
        let expr = DiceExpression::parse("d20").unwrap();
        let one_high = expr.roll_with(AdvantageMode::Disadvantage, sequence(&[20, 9]));
        assert!(!one_high.is_critical);

        let both_high = expr.roll_with(AdvantageMode::Disadvantage, sequence(&[20, 20]));
        assert!(both_high.is_critical);
    }

    #[test]
    fn test_advantage_ignored_for_other_shapes() {
        let expr = DiceExpression::parse("2d20").unwrap();
        let result = expr.roll_with(AdvantageMode::Advantage, sequence(&[20, 1]));
        assert_eq!(result.rolls, vec![20, 1]);
        assert_eq!(result.discarded, None);
        assert!(!result.is_critical);
        assert!(!result.is_fumble);
    }

    #[test]
    fn test_critical_and_fumble_only_on_single_d20() {
        let d20 = DiceExpression::parse("1d20+5").unwrap();
        assert!(d20.roll_with(AdvantageMode::Normal, sequence(&[20])).is_critical);
        assert!(d20.roll_with(AdvantageMode::Normal, sequence(&[1])).is_fumble);

        let d12 = DiceExpression::parse("1d12").unwrap();
        let result = d12.roll_with(AdvantageMode::Normal, sequence(&[12]));
        assert!(!result.is_critical);
    }

    #[test]
    fn test_roll_clamps_faces() {
        let expr = DiceExpression::parse("1d6").unwrap();
        assert_eq!(expr.roll_with(AdvantageMode::Normal, |_| 99).total, 6);
        assert_eq!(expr.roll_with(AdvantageMode::Normal, |_| 0).total, 1);
    }

    #[test]
    fn test_combine_modes() {
        use AdvantageMode::*;
        assert_eq!(Advantage.combine(Disadvantage), Normal);
        assert_eq!(Normal.combine(Advantage), Advantage);
        assert_eq!(Disadvantage.combine(Disadvantage), Disadvantage);
    }

    #[test]
    fn test_breakdown() {
        let expr = DiceExpression::parse("1d20-2").unwrap();
        let result = expr.roll_with(AdvantageMode::Advantage, sequence(&[20, 4]));
        assert_eq!(result.breakdown(), "1d20 [20] (dropped 4) - 2 = 18 (critical!)");
    }

    #[test]
    fn test_display_round_trips() {
        for input in ["1d20", "2d6+3", "4d8-2"] {
            assert_eq!(DiceExpression::parse(input).unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_min_max_total() {
        let expr = DiceExpression::parse("3d6+2").unwrap();
        assert_eq!(expr.min_total(), 5);
        assert_eq!(expr.max_total(), 20);
    }
}
