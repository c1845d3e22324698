//! Close an intervention and hand the chat back to automated play.
//!
//! The chat only resumes once no other intervention for it is pending.

use std::sync::Arc;

use chatgm_domain::{ErrorCode, Intervention, InterventionId};

use crate::entities::{self, InterventionError, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum ResolveInterventionError {
    #[error(transparent)]
    Intervention(#[from] InterventionError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ErrorCode for ResolveInterventionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Intervention(e) => e.code(),
            Self::Session(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedIntervention {
    pub intervention: Intervention,
    /// Whether the chat went back to automated play.
    pub session_resumed: bool,
    /// Line to post into the chat.
    pub announcement: String,
}

/// Use case for a human game master closing an intervention.
pub struct ResolveIntervention {
    intervention: Arc<entities::Intervention>,
    session: Arc<entities::Session>,
}

impl ResolveIntervention {
    pub fn new(intervention: Arc<entities::Intervention>, session: Arc<entities::Session>) -> Self {
        Self {
            intervention,
            session,
        }
    }

    /// Resolve the intervention. The chat's session returns to `Active`
    /// once no other intervention for it is pending.
    pub async fn execute(
        &self,
        id: InterventionId,
        resolution: &str,
        resolved_by: &str,
    ) -> Result<ResolvedIntervention, ResolveInterventionError> {
        let intervention = self.intervention.resolve(id, resolution, resolved_by).await?;
        let chat_id = intervention.chat_id().to_string();

        let still_pending = self.intervention.pending_for_chat(&chat_id).await?;
        let session_resumed = if still_pending.is_empty() {
            match self.session.resume(&chat_id).await {
                Ok(_) => true,
                // Session expired or was never handed over.
                Err(SessionError::InvalidTransition { .. }) => false,
                Err(e) => return Err(e.into()),
            }
        } else {
            tracing::debug!(chat_id = %chat_id, remaining = still_pending.len(), "Session stays with human");
            false
        };

        Ok(ResolvedIntervention {
            announcement: format!("GM: {}", resolution.trim()),
            intervention,
            session_resumed,
        })
    }
}
