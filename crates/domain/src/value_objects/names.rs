//! Character names: sanitization, format rules and alternatives
//!
//! Every name passes through [`sanitize_name`] before it is validated,
//! compared or stored, so "  gandalf " and "Gandalf" are the same name.

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::DomainError;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 50;

/// Names nobody may take, compared case-insensitively.
pub const RESERVED_NAMES: [&str; 8] = [
    "admin",
    "system",
    "test",
    "null",
    "undefined",
    "gm",
    "master",
    "god",
];

const SUGGESTION_EPITHETS: [&str; 5] = ["Heroic", "Valiant", "Mystic", "Wild", "Bold"];

/// Normalize a raw name: NFC, whitespace collapsed and trimmed, control
/// characters removed, each word title-cased.
///
/// Idempotent: `sanitize_name(&sanitize_name(x)) == sanitize_name(x)`.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .nfc()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_control() {
                None
            } else {
                Some(c)
            }
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    title_case(&collapsed).nfc().collect()
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        let mapped = if in_word {
            single_char_mapping(c.to_lowercase()).unwrap_or(c)
        } else {
            single_char_mapping(c.to_uppercase()).unwrap_or(c)
        };
        out.push(mapped);
        in_word = c.is_alphanumeric() || is_combining_mark(c);
    }
    out
}

// Multi-char case mappings (e.g. 'ß' -> "SS") are skipped so sanitizing twice is a no-op.
fn single_char_mapping(mut mapping: impl Iterator<Item = char>) -> Option<char> {
    let first = mapping.next()?;
    mapping.next().is_none().then_some(first)
}

/// Key used for case-insensitive uniqueness.
pub fn name_key(name: &str) -> String {
    sanitize_name(name).to_lowercase()
}

/// Format problems of an already-sanitized name, empty when it is acceptable.
pub fn name_format_errors(sanitized: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let len = sanitized.chars().count();
    if len < MIN_NAME_LENGTH {
        errors.push(format!(
            "Name must be at least {} characters long",
            MIN_NAME_LENGTH
        ));
    }
    if len > MAX_NAME_LENGTH {
        errors.push(format!(
            "Name cannot exceed {} characters",
            MAX_NAME_LENGTH
        ));
    }
    let allowed = |c: char| c.is_alphanumeric() || is_combining_mark(c) || matches!(c, ' ' | '\'' | '-');
    if !sanitized.chars().all(allowed) {
        errors.push("Name may only contain letters, digits, spaces, apostrophes and hyphens".into());
    }
    if len > 0 && !sanitized.chars().any(char::is_alphabetic) {
        errors.push("Name must contain at least one letter".into());
    }
    let lowered = sanitized.to_lowercase();
    if RESERVED_NAMES.contains(&lowered.as_str()) {
        errors.push(format!("'{}' is a reserved name", sanitized));
    }
    errors
}

// ============================================================================
// CharacterName
// ============================================================================

/// A sanitized, format-checked character name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CharacterName(String);

impl CharacterName {
    /// Sanitize and validate a character name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` listing every failed format rule.
    pub fn new(name: impl AsRef<str>) -> Result<Self, DomainError> {
        let sanitized = sanitize_name(name.as_ref());
        let errors = name_format_errors(&sanitized);
        if !errors.is_empty() {
            return Err(DomainError::validation(errors.join("; ")));
        }
        Ok(Self(sanitized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form used for case-insensitive uniqueness.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Alternatives offered when this name is taken: numeric suffixes
    /// "{name} 2".."{name} 5", then epithet variants. Candidates come back
    /// sanitized; those that would not be valid names are left out.
    pub fn alternatives(&self) -> Vec<String> {
        let numbered = (2..=5).map(|n| format!("{} {}", self.0, n));
        let epithets = SUGGESTION_EPITHETS
            .iter()
            .map(|adj| format!("{} the {}", self.0, adj));
        numbered
            .chain(epithets)
            .filter_map(|candidate| Self::new(candidate).ok().map(String::from))
            .collect()
    }
}

impl fmt::Display for CharacterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CharacterName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CharacterName> for String {
    fn from(name: CharacterName) -> String {
        name.0
    }
}
