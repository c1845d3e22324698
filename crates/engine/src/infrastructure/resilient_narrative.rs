//! Narrative client wrapper with exponential backoff retry.
//!
//! Wraps any `NarrativePort` so transient failures are retried before the
//! caller falls back to a canned line.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{NarrativeContext, NarrativeError, NarrativePort};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Base delay in milliseconds before first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            max_delay_ms: 5000,
            jitter_factor: 0.2,
        }
    }
}

/// Wrapper that adds retry logic to any narrative collaborator
pub struct ResilientNarrator {
    inner: Arc<dyn NarrativePort>,
    config: RetryConfig,
}

impl ResilientNarrator {
    pub fn new(inner: Arc<dyn NarrativePort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before retry `attempt` (1-based): exponential with jitter.
    fn calculate_delay(&self, attempt: u32) -> u64 {
        let base = self.config.base_delay_ms;
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.config.max_delay_ms);

        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }

    /// A malformed narration will not improve on retry.
    fn is_retryable(error: &NarrativeError) -> bool {
        matches!(error, NarrativeError::RequestFailed(_))
    }
}

#[async_trait]
impl NarrativePort for ResilientNarrator {
    async fn narrate(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        let mut attempt = 0;
        loop {
            match self.inner.narrate(context).await {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "Narrative request succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(e) if attempt < self.config.max_retries && Self::is_retryable(&e) => {
                    attempt += 1;
                    let delay = self.calculate_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay,
                        error = %e,
                        "Narrative request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    tracing::error!(
                        attempts = attempt + 1,
                        error = %e,
                        "Narrative request failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockNarrativePort, NarrativePurpose};
    use chatgm_domain::{Session, SessionId};
    use chrono::Utc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter_factor: 0.0,
        }
    }

    fn context() -> NarrativeContext {
        NarrativeContext {
            purpose: NarrativePurpose::PlayerAction,
            session: Session::new(SessionId::new(), "chat-1", Utc::now()),
            character: None,
            action: "I open the door".to_string(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mut mock = MockNarrativePort::new();
        let mut calls = 0;
        mock.expect_narrate().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(NarrativeError::RequestFailed("timeout".into()))
            } else {
                Ok("The door creaks open.".into())
            }
        });
        let narrator = ResilientNarrator::new(Arc::new(mock), fast());

        assert_eq!(narrator.narrate(&context()).await.unwrap(), "The door creaks open.");
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let mut mock = MockNarrativePort::new();
        mock.expect_narrate()
            .times(3)
            .returning(|_| Err(NarrativeError::RequestFailed("down".into())));
        let narrator = ResilientNarrator::new(Arc::new(mock), fast());

        assert!(narrator.narrate(&context()).await.is_err());
    }

    #[tokio::test]
    async fn invalid_response_is_not_retried() {
        let mut mock = MockNarrativePort::new();
        mock.expect_narrate()
            .times(1)
            .returning(|_| Err(NarrativeError::InvalidResponse("empty".into())));
        let narrator = ResilientNarrator::new(Arc::new(mock), fast());

        assert!(matches!(
            narrator.narrate(&context()).await,
            Err(NarrativeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let narrator = ResilientNarrator::new(
            Arc::new(MockNarrativePort::new()),
            RetryConfig {
                max_retries: 5,
                base_delay_ms: 100,
                max_delay_ms: 300,
                jitter_factor: 0.0,
            },
        );
        assert_eq!(narrator.calculate_delay(1), 100);
        assert_eq!(narrator.calculate_delay(2), 200);
        assert_eq!(narrator.calculate_delay(3), 300);
    }
}
