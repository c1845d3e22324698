//! Offline narrator that builds short scene text from session context.
//!
//! Stands in for a text-generation provider when none is configured.

use async_trait::async_trait;

use crate::infrastructure::ports::{NarrativeContext, NarrativeError, NarrativePort, NarrativePurpose};

pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TemplateNarrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NarrativePort for TemplateNarrator {
    async fn narrate(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        let world = context.session.world_state();
        let location = world.location().unwrap_or("an unfamiliar place");
        let time_of_day = world.time_of_day().unwrap_or("an uncertain hour");

        let text = match context.purpose {
            NarrativePurpose::SceneIntro => format!(
                "{scene}. It is {time_of_day} at {location}; the air hums with the promise of adventure.",
                scene = context.session.current_scene(),
            ),
            NarrativePurpose::PlayerAction => {
                let actor = context
                    .character
                    .as_ref()
                    .map_or("Someone", |c| c.name().as_str());
                let action = context.action.trim();
                if action.is_empty() {
                    return Err(NarrativeError::InvalidResponse(
                        "nothing to narrate".to_string(),
                    ));
                }
                format!("At {location}, {actor} acts: \"{action}\". The world shifts in response.")
            }
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgm_domain::{Session, SessionId};
    use chrono::Utc;

    fn context(purpose: NarrativePurpose, action: &str) -> NarrativeContext {
        NarrativeContext {
            purpose,
            session: Session::new(SessionId::new(), "chat-1", Utc::now()),
            character: None,
            action: action.to_string(),
        }
    }

    #[tokio::test]
    async fn intro_mentions_default_location() {
        let text = TemplateNarrator::new()
            .narrate(&context(NarrativePurpose::SceneIntro, ""))
            .await
            .unwrap();
        assert!(text.contains("The Golden Dragon Tavern"));
        assert!(text.contains("afternoon"));
    }

    #[tokio::test]
    async fn empty_action_is_rejected() {
        let result = TemplateNarrator::new()
            .narrate(&context(NarrativePurpose::PlayerAction, "   "))
            .await;
        assert!(result.is_err());
    }
}
