//! Versioned wire format for cached and stored aggregates
//!
//! Every payload is wrapped as `{"version": N, "data": {...}}`. Decoding
//! rejects unknown versions instead of guessing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregates::{Character, Intervention, Session};
use crate::error::{DomainError, ErrorCode};

/// Current format version for every aggregate.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported {entity} format version {found} (expected {expected})", expected = FORMAT_VERSION)]
    UnsupportedVersion { entity: &'static str, found: u32 },

    #[error("Decoded {entity} violates its invariants: {source}")]
    Invariant {
        entity: &'static str,
        #[source]
        source: DomainError,
    },
}

impl ErrorCode for SerializationError {
    fn code(&self) -> &'static str {
        "serialization_error"
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    data: serde_json::Value,
}

fn encode<T: Serialize>(value: &T) -> Result<String, SerializationError> {
    Ok(serde_json::to_string(&EnvelopeRef {
        version: FORMAT_VERSION,
        data: value,
    })?)
}

fn decode<T: DeserializeOwned>(entity: &'static str, raw: &str) -> Result<T, SerializationError> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    if envelope.version != FORMAT_VERSION {
        return Err(SerializationError::UnsupportedVersion {
            entity,
            found: envelope.version,
        });
    }
    Ok(serde_json::from_value(envelope.data)?)
}

pub fn encode_session(session: &Session) -> Result<String, SerializationError> {
    encode(session)
}

pub fn decode_session(raw: &str) -> Result<Session, SerializationError> {
    decode("session", raw)
}

pub fn encode_character(character: &Character) -> Result<String, SerializationError> {
    encode(character)
}

pub fn decode_character(raw: &str) -> Result<Character, SerializationError> {
    let character: Character = decode("character", raw)?;
    character
        .check_invariants()
        .map_err(|source| SerializationError::Invariant {
            entity: "character",
            source,
        })?;
    Ok(character)
}

pub fn encode_intervention(intervention: &Intervention) -> Result<String, SerializationError> {
    encode(intervention)
}

pub fn decode_intervention(raw: &str) -> Result<Intervention, SerializationError> {
    decode("intervention", raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::{CharacterDraft, SessionState};
    use crate::ids::{CharacterId, SessionId};
    use chrono::Utc;

    #[test]
    fn session_envelope_carries_version() {
        let mut session = Session::new(SessionId::new(), "chat-1", Utc::now());
        session.join("alice");
        session.transition(SessionState::Active).unwrap();

        let raw = encode_session(&session).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["data"]["chatId"], "chat-1");
        assert_eq!(value["data"]["state"], "active");

        assert_eq!(decode_session(&raw).unwrap(), session);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let session = Session::new(SessionId::new(), "chat-1", Utc::now());
        let raw = encode_session(&session)
            .unwrap()
            .replacen("\"version\":1", "\"version\":7", 1);
        assert!(matches!(
            decode_session(&raw),
            Err(SerializationError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn character_decoding_rechecks_hit_points() {
        let draft = CharacterDraft::new("Gimli", "dwarf", "fighter");
        let character =
            Character::create(CharacterId::new(), "p1", SessionId::new(), &draft, Utc::now())
                .unwrap();
        let raw = encode_character(&character).unwrap();
        assert_eq!(decode_character(&raw).unwrap(), character);

        let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["data"]["hitPointsCurrent"] = serde_json::json!(999);
        let tampered = value.to_string();
        assert!(matches!(
            decode_character(&tampered),
            Err(SerializationError::Invariant { .. })
        ));
    }

    #[test]
    fn character_decoding_rejects_bad_scores() {
        let draft = CharacterDraft::new("Gimli", "dwarf", "fighter");
        let character =
            Character::create(CharacterId::new(), "p1", SessionId::new(), &draft, Utc::now())
                .unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&encode_character(&character).unwrap()).unwrap();
        value["data"]["abilities"]["strength"] = serde_json::json!(0);
        assert!(matches!(
            decode_character(&value.to_string()),
            Err(SerializationError::Json(_))
        ));
    }
}
