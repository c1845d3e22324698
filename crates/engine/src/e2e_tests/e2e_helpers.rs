//! E2E test helpers for constructing the full application stack.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::app::{App, Collaborators, Repositories};
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::clock::{ManualClock, SequenceRandom};
use crate::infrastructure::memory::InMemoryRepositories;
use crate::infrastructure::narrative::TemplateNarrator;
use crate::infrastructure::ports::{ClockPort, NotifierPort, NotifyError};
use crate::infrastructure::settings::EngineConfig;
use crate::use_cases::message::Reply;

// =============================================================================
// Recording Notifier
// =============================================================================

/// Notification channel that keeps every notice it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifierPort for RecordingNotifier {
    fn channel(&self) -> String {
        "recording".to_string()
    }

    async fn notify(&self, notice: &str) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push(notice.to_string());
        Ok(())
    }
}

/// Channel that is always down.
pub struct BrokenNotifier;

#[async_trait]
impl NotifierPort for BrokenNotifier {
    fn channel(&self) -> String {
        "broken".to_string()
    }

    async fn notify(&self, _notice: &str) -> Result<(), NotifyError> {
        Err(NotifyError::delivery("broken", "connection refused"))
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// Fully wired App with handles on the clock and the notices.
pub struct E2ETestContext {
    pub app: Arc<App>,
    pub clock: Arc<ManualClock>,
    pub notices: Arc<RecordingNotifier>,
}

impl E2ETestContext {
    pub fn setup() -> Self {
        Self::setup_with_config(EngineConfig::default())
    }

    /// Dice always land on their lowest face and the random escalation
    /// sample never fires.
    pub fn setup_with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 7, 4, 19, 0, 0).unwrap(),
        ));
        let notices = Arc::new(RecordingNotifier::default());
        let repos = InMemoryRepositories::new(config.intervention_history_capacity);

        let app = App::new(
            Repositories {
                character: repos.character,
                intervention: repos.intervention,
            },
            Collaborators {
                cache: Arc::new(TtlCache::<String, String>::new(clock.clone())),
                narrator: Arc::new(TemplateNarrator::new()),
                notifiers: vec![
                    notices.clone() as Arc<dyn NotifierPort>,
                    Arc::new(BrokenNotifier) as Arc<dyn NotifierPort>,
                ],
                clock: clock.clone(),
                random: Arc::new(SequenceRandom::new([])),
            },
            config,
        );

        Self {
            app: Arc::new(app),
            clock,
            notices,
        }
    }

    /// Send one chat message through the inbound use case.
    pub async fn say(&self, player_id: &str, chat_id: &str, text: &str) -> Reply {
        self.app
            .use_cases
            .message
            .handle
            .execute(player_id, chat_id, text)
            .await
            .unwrap()
    }

    pub fn clock_now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(chrono::Duration::minutes(minutes));
    }
}
