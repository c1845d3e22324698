//! Value types that cross port boundaries.

use chatgm_domain::{Character, Session};

use super::error::NotifyError;

/// Write-time rules the character store applies atomically with the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintRules {
    pub enforce_class_race: bool,
    pub max_per_player: u32,
}

/// Why the narrative collaborator is being asked for text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativePurpose {
    SceneIntro,
    PlayerAction,
}

/// Everything the narrative collaborator sees for one request.
#[derive(Debug, Clone)]
pub struct NarrativeContext {
    pub purpose: NarrativePurpose,
    pub session: Session,
    pub character: Option<Character>,
    pub action: String,
}

/// Delivery result of one notification channel.
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel: String,
    pub result: Result<(), NotifyError>,
}

impl ChannelOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}
