//! Intervention entity operations: records of messages handed to a human
//! game master, and the notices sent about them.

use std::sync::Arc;

use chatgm_domain::{
    self as domain, DomainError, ErrorCode, InterventionId, Session, TriggerType,
};
use tokio::sync::Mutex;

use crate::infrastructure::notify::NotificationFanout;
use crate::infrastructure::ports::{ChannelOutcome, ClockPort, InterventionRepo, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum InterventionError {
    #[error("Intervention not found: {0}")]
    NotFound(InterventionId),

    #[error("Intervention {0} is already resolved")]
    AlreadyResolved(InterventionId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RepoError),
}

impl ErrorCode for InterventionError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyResolved(_) => "invalid_transition",
            Self::Validation(_) => "validation_error",
            Self::Storage(e) => e.code(),
        }
    }
}

/// Intervention entity operations.
pub struct Intervention {
    repo: Arc<dyn InterventionRepo>,
    clock: Arc<dyn ClockPort>,
    fanout: Arc<NotificationFanout>,
    resolving: Mutex<()>,
}

impl Intervention {
    pub fn new(
        repo: Arc<dyn InterventionRepo>,
        clock: Arc<dyn ClockPort>,
        fanout: Arc<NotificationFanout>,
    ) -> Self {
        Self {
            repo,
            clock,
            fanout,
            resolving: Mutex::new(()),
        }
    }

    /// Record a pending intervention with a snapshot of `session`.
    ///
    /// Nothing is delivered; pass the result to [`Self::notify`].
    pub async fn request(
        &self,
        session: &Session,
        player_id: &str,
        message: &str,
        trigger: TriggerType,
    ) -> Result<domain::Intervention, InterventionError> {
        let intervention = domain::Intervention::new(
            InterventionId::new(),
            session,
            player_id,
            message,
            trigger,
            self.clock.now(),
        );
        self.repo.save(&intervention).await?;
        tracing::info!(
            intervention_id = %intervention.id(),
            chat_id = %session.chat_id(),
            player_id = %player_id,
            trigger = %trigger,
            "Intervention requested"
        );
        Ok(intervention)
    }

    /// Mark a pending intervention resolved and move it to the history log.
    pub async fn resolve(
        &self,
        id: InterventionId,
        resolution: &str,
        resolved_by: &str,
    ) -> Result<domain::Intervention, InterventionError> {
        let _guard = self.resolving.lock().await;

        let mut intervention = self
            .repo
            .get(id)
            .await?
            .ok_or(InterventionError::NotFound(id))?;
        intervention
            .resolve(resolution, resolved_by, self.clock.now())
            .map_err(|e| match e {
                DomainError::InvalidStateTransition { .. } => InterventionError::AlreadyResolved(id),
                other => InterventionError::Validation(other.to_string()),
            })?;
        self.repo.save(&intervention).await?;

        tracing::info!(
            intervention_id = %id,
            chat_id = %intervention.chat_id(),
            resolved_by = %resolved_by,
            "Intervention resolved"
        );
        Ok(intervention)
    }

    pub async fn get(&self, id: InterventionId) -> Result<Option<domain::Intervention>, InterventionError> {
        Ok(self.repo.get(id).await?)
    }

    /// Pending interventions, oldest first.
    pub async fn pending(&self) -> Result<Vec<domain::Intervention>, InterventionError> {
        Ok(self.repo.pending().await?)
    }

    pub async fn pending_for_chat(&self, chat_id: &str) -> Result<Vec<domain::Intervention>, InterventionError> {
        Ok(self.repo.pending_for_chat(chat_id).await?)
    }

    /// Resolved interventions, newest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<domain::Intervention>, InterventionError> {
        Ok(self.repo.history(limit).await?)
    }

    // =========================================================================
    // Notices
    // =========================================================================

    pub async fn notify(&self, intervention: &domain::Intervention) -> Vec<ChannelOutcome> {
        self.fanout.dispatch(&intervention.notice()).await
    }

    /// A player wrote again while their chat is with a human.
    pub async fn notify_follow_up(&self, chat_id: &str, player_id: &str, message: &str) -> Vec<ChannelOutcome> {
        let notice = format!(
            "Follow-up while waiting on GM\nChat: {chat_id}\nPlayer: {player_id}\nMessage: \"{message}\""
        );
        self.fanout.dispatch(&notice).await
    }

    /// Report an internal failure to the humans on call.
    pub async fn notify_error(&self, chat_id: &str, error: &str, context: &str) -> Vec<ChannelOutcome> {
        let notice = format!(
            "System error\nChat: {chat_id}\nError: {error}\nContext: {context}\nAt: {at}",
            at = self.clock.now().format("%Y-%m-%d %H:%M:%S UTC"),
        );
        self.fanout.dispatch(&notice).await
    }
}
