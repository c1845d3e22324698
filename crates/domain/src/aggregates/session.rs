//! Session aggregate - the game state of one chat conversation
//!
//! # State graph
//!
//! ```text
//! Inactive -> Active <-> { Paused, Combat, Exploration, Social }
//! any state -> WaitingOnHuman   (escalation only)
//! WaitingOnHuman -> Active      (human resolution only)
//! ```
//!
//! There is no terminal state; idle sessions are evicted from the cache
//! rather than transitioned.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;
use crate::ids::SessionId;

pub const DEFAULT_SCENE: &str = "The adventure begins";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Inactive,
    Active,
    Paused,
    Combat,
    Exploration,
    Social,
    WaitingOnHuman,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Combat => "combat",
            Self::Exploration => "exploration",
            Self::Social => "social",
            Self::WaitingOnHuman => "waiting_on_human",
        }
    }

    /// Sub-modes entered from and exited to `Active`.
    pub fn is_situational(&self) -> bool {
        matches!(
            self,
            Self::Paused | Self::Combat | Self::Exploration | Self::Social
        )
    }

    /// Whether the caller-driven graph allows `self -> target`.
    /// `WaitingOnHuman` is never reachable or left through this path.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        match (self, target) {
            (Self::Inactive, Self::Active) => true,
            (Self::Active, t) => t.is_situational(),
            (s, Self::Active) => s.is_situational(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "combat" => Ok(Self::Combat),
            "exploration" => Ok(Self::Exploration),
            "social" => Ok(Self::Social),
            "waiting_on_human" | "waiting" => Ok(Self::WaitingOnHuman),
            other => Err(DomainError::parse(format!("Unknown session state: {}", other))),
        }
    }
}

// ============================================================================
// World state
// ============================================================================

/// Free-form scene context. The core only reads a few well-known keys and
/// otherwise keeps the map exactly as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldState(Map<String, Value>);

impl WorldState {
    pub fn empty() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn location(&self) -> Option<&str> {
        self.0.get("location").and_then(Value::as_str)
    }

    pub fn time_of_day(&self) -> Option<&str> {
        self.0.get("time_of_day").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl Default for WorldState {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("location".into(), Value::from("The Golden Dragon Tavern"));
        map.insert("time_of_day".into(), Value::from("afternoon"));
        map.insert("weather".into(), Value::from("sunny"));
        map.insert(
            "npcs_present".into(),
            Value::from(vec!["Thorek the Barkeep", "Mysterious Traveler"]),
        );
        Self(map)
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Deadly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    pub difficulty: Difficulty,
    pub auto_roll: bool,
    pub detailed_descriptions: bool,
    pub language: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,
            auto_roll: false,
            detailed_descriptions: true,
            language: "en".into(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Per-conversation game session.
///
/// # Invariants
///
/// - `players` has set semantics (no duplicates, order irrelevant)
/// - a rejected transition leaves the session untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: SessionId,
    chat_id: String,
    state: SessionState,
    current_scene: String,
    world_state: WorldState,
    players: BTreeSet<String>,
    gm_id: Option<String>,
    settings: SessionSettings,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    revision: u64,
}

impl Session {
    /// A fresh `Inactive` session with the default world state.
    pub fn new(id: SessionId, chat_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            chat_id: chat_id.into(),
            state: SessionState::Inactive,
            current_scene: DEFAULT_SCENE.into(),
            world_state: WorldState::default(),
            players: BTreeSet::new(),
            gm_id: None,
            settings: SessionSettings::default(),
            created_at: now,
            last_activity: now,
            revision: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_scene(&self) -> &str {
        &self.current_scene
    }

    pub fn world_state(&self) -> &WorldState {
        &self.world_state
    }

    pub fn world_state_mut(&mut self) -> &mut WorldState {
        &mut self.world_state
    }

    pub fn players(&self) -> &BTreeSet<String> {
        &self.players
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.contains(player_id)
    }

    pub fn gm_id(&self) -> Option<&str> {
        self.gm_id.as_deref()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SessionSettings {
        &mut self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Cache revision, bumped on every successful save.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    pub fn is_waiting_on_human(&self) -> bool {
        self.state == SessionState::WaitingOnHuman
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now - self.last_activity >= idle_timeout
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Move along the caller-driven part of the state graph.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` for any edge outside the
    /// graph, including every edge into or out of `WaitingOnHuman`.
    pub fn transition(&mut self, target: SessionState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(target) {
            return Err(DomainError::invalid_state_transition(
                self.state.as_str(),
                target.as_str(),
            ));
        }
        self.state = target;
        Ok(())
    }

    /// Hand a started session to a human. Returns the state that was
    /// interrupted; escalating a session already waiting is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` for an `Inactive`
    /// session, which can only leave through `Active`.
    pub fn escalate(&mut self) -> Result<SessionState, DomainError> {
        if self.state == SessionState::Inactive {
            return Err(DomainError::invalid_state_transition(
                self.state.as_str(),
                SessionState::WaitingOnHuman.as_str(),
            ));
        }
        let previous = self.state;
        self.state = SessionState::WaitingOnHuman;
        Ok(previous)
    }

    /// Return from human control to `Active`.
    pub fn resume_from_human(&mut self) -> Result<(), DomainError> {
        if self.state != SessionState::WaitingOnHuman {
            return Err(DomainError::invalid_state_transition(
                self.state.as_str(),
                SessionState::Active.as_str(),
            ));
        }
        self.state = SessionState::Active;
        Ok(())
    }

    /// Add a participant. Returns whether they were new.
    pub fn join(&mut self, player_id: impl Into<String>) -> bool {
        self.players.insert(player_id.into())
    }

    pub fn leave(&mut self, player_id: &str) -> bool {
        self.players.remove(player_id)
    }

    pub fn set_gm(&mut self, gm_id: impl Into<String>) {
        self.gm_id = Some(gm_id.into());
    }

    pub fn set_scene(&mut self, scene: impl Into<String>) {
        self.current_scene = scene.into();
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}
