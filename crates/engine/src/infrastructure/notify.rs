//! Notification channels for human game masters.

use std::sync::Arc;

use async_trait::async_trait;

use crate::infrastructure::ports::{ChannelOutcome, NotifierPort, NotifyError};

/// Writes notices to the log. Always available.
pub struct LogNotifier;

#[async_trait]
impl NotifierPort for LogNotifier {
    fn channel(&self) -> String {
        "log".to_string()
    }

    async fn notify(&self, notice: &str) -> Result<(), NotifyError> {
        tracing::info!(channel = "log", notice = %notice, "GM notice");
        Ok(())
    }
}

/// Delivers a notice through every configured channel.
///
/// A failing channel is logged and reported; the remaining channels are
/// still attempted.
pub struct NotificationFanout {
    channels: Vec<Arc<dyn NotifierPort>>,
}

impl NotificationFanout {
    pub fn new(channels: Vec<Arc<dyn NotifierPort>>) -> Self {
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub async fn dispatch(&self, notice: &str) -> Vec<ChannelOutcome> {
        let mut outcomes = Vec::with_capacity(self.channels.len());
        for notifier in &self.channels {
            let channel = notifier.channel();
            let result = notifier.notify(notice).await;
            match &result {
                Ok(()) => tracing::debug!(channel = %channel, "Notice delivered"),
                Err(e) => tracing::warn!(channel = %channel, error = %e, "Notice delivery failed"),
            }
            outcomes.push(ChannelOutcome { channel, result });
        }
        if !outcomes.is_empty() && outcomes.iter().all(|o| !o.is_delivered()) {
            tracing::error!(channels = outcomes.len(), "Notice reached no channel");
        }
        outcomes
    }
}
