//! Intervention aggregate - a player action handed to a human game master

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::session::{Session, SessionState};
use crate::error::DomainError;
use crate::ids::{InterventionId, SessionId};

/// Why automated resolution was set aside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    InappropriateContent,
    RulesDispute,
    PlayerConflict,
    ComplexSituation,
    TechnicalError,
    HumanRequest,
    AiUncertainty,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InappropriateContent => "inappropriate_content",
            Self::RulesDispute => "rules_dispute",
            Self::PlayerConflict => "player_conflict",
            Self::ComplexSituation => "complex_situation",
            Self::TechnicalError => "technical_error",
            Self::HumanRequest => "human_request",
            Self::AiUncertainty => "ai_uncertainty",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::InappropriateContent => "Inappropriate content",
            Self::RulesDispute => "Rules dispute",
            Self::PlayerConflict => "Player conflict",
            Self::ComplexSituation => "Complex situation",
            Self::TechnicalError => "Technical error",
            Self::HumanRequest => "Player asked for a human",
            Self::AiUncertainty => "Automated narrator uncertain",
        }
    }

    /// Categories a human should look at first.
    pub fn is_high_priority(&self) -> bool {
        matches!(
            self,
            Self::InappropriateContent | Self::PlayerConflict | Self::HumanRequest
        )
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Pending,
    Resolved,
}

/// Session snapshot taken when the intervention was raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionContext {
    pub current_scene: String,
    pub location: Option<String>,
    pub session_state: SessionState,
    pub players_count: usize,
}

impl InterventionContext {
    pub fn capture(session: &Session) -> Self {
        Self {
            current_scene: session.current_scene().to_string(),
            location: session.world_state().location().map(str::to_string),
            session_state: session.state(),
            players_count: session.players().len(),
        }
    }
}

/// Audit trail of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub text: String,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    id: InterventionId,
    session_id: SessionId,
    chat_id: String,
    player_id: String,
    message: String,
    trigger: TriggerType,
    context: InterventionContext,
    status: InterventionStatus,
    created_at: DateTime<Utc>,
    resolution: Option<Resolution>,
}

impl Intervention {
    pub fn new(
        id: InterventionId,
        session: &Session,
        player_id: impl Into<String>,
        message: impl Into<String>,
        trigger: TriggerType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            session_id: session.id(),
            chat_id: session.chat_id().to_string(),
            player_id: player_id.into(),
            message: message.into(),
            trigger,
            context: InterventionContext::capture(session),
            status: InterventionStatus::Pending,
            created_at: now,
            resolution: None,
        }
    }

    #[inline]
    pub fn id(&self) -> InterventionId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trigger(&self) -> TriggerType {
        self.trigger
    }

    pub fn context(&self) -> &InterventionContext {
        &self.context
    }

    pub fn status(&self) -> InterventionStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == InterventionStatus::Pending
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    /// Mark resolved with its audit trail.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` if already resolved, and
    /// `DomainError::Validation` for an empty resolution text.
    pub fn resolve(
        &mut self,
        text: impl Into<String>,
        resolved_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::invalid_state_transition("resolved", "resolved"));
        }
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::validation("Resolution text cannot be empty"));
        }
        self.status = InterventionStatus::Resolved;
        self.resolution = Some(Resolution {
            text,
            resolved_by: resolved_by.into(),
            resolved_at: now,
        });
        Ok(())
    }

    /// Human-readable summary handed to notification channels.
    pub fn notice(&self) -> String {
        let priority = if self.trigger.is_high_priority() {
            "HIGH"
        } else {
            "normal"
        };
        format!(
            "GM intervention needed [{priority}]\n\
             Reason: {reason}\n\
             Chat: {chat}\n\
             Player: {player}\n\
             Message: \"{message}\"\n\
             Scene: {scene}\n\
             Location: {location}\n\
             State: {state} | Players: {players}\n\
             Intervention: {id}\n\
             Opened: {opened}",
            reason = self.trigger.label(),
            chat = self.chat_id,
            player = self.player_id,
            message = self.message,
            scene = self.context.current_scene,
            location = self.context.location.as_deref().unwrap_or("unknown"),
            state = self.context.session_state,
            players = self.context.players_count,
            id = self.id,
            opened = self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}
