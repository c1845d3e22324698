//! Unified error types for the domain layer
//!
//! Every error that can reach a caller carries a stable machine-readable code
//! (see [`ErrorCode`]) next to its human-readable message.

use thiserror::Error;

use crate::value_objects::DiceError;

/// Stable, machine-readable identifier for an error kind.
///
/// Codes never change once published; messages may.
pub trait ErrorCode {
    fn code(&self) -> &'static str;
}

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Parse error (for value objects and closed enumerations)
    #[error("Parse error: {0}")]
    Parse(String),

    /// State transition not allowed
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// A per-owner limit has been reached
    #[error("Limit reached: {current}/{max}")]
    LimitReached { current: u32, max: u32 },

    /// Dice expression could not be parsed or rolled
    #[error(transparent)]
    Dice(#[from] DiceError),
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    ///
    /// Use this when a field is outside its allowed range or domain:
    /// - Ability scores outside 1..=30
    /// - Hit points outside 0..=max
    /// - Names that fail the format rules
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invalid state transition error
    pub fn invalid_state_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a limit reached error
    pub fn limit_reached(current: u32, max: u32) -> Self {
        Self::LimitReached { current, max }
    }
}

impl ErrorCode for DomainError {
    fn code(&self) -> &'static str {
        match self {
            // Unknown enum members are field-domain violations from the caller's view.
            Self::Validation(_) | Self::Parse(_) => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::InvalidStateTransition { .. } => "invalid_transition",
            Self::LimitReached { .. } => "character_limit",
            Self::Dice(err) => err.code(),
        }
    }
}
