//! Application state and composition.

use std::sync::Arc;

use crate::entities::{self, EscalationRules};
use crate::infrastructure::{
    notify::NotificationFanout,
    ports::{
        CachePort, CharacterRepo, ClockPort, ConstraintRules, InterventionRepo, NarrativePort,
        NotifierPort, RandomPort,
    },
    settings::EngineConfig,
};
use crate::use_cases;

/// Main application state.
///
/// Holds the repositories, the stateful entities the process loop needs
/// directly, and all use cases.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
    pub characters: Arc<entities::Character>,
    pub sessions: Arc<entities::Session>,
    pub interventions: Arc<entities::Intervention>,
    pub config: EngineConfig,
}

/// Container for all repository ports.
pub struct Repositories {
    pub character: Arc<dyn CharacterRepo>,
    pub intervention: Arc<dyn InterventionRepo>,
}

/// Container for all use cases.
pub struct UseCases {
    pub message: use_cases::MessageUseCases,
    pub character: use_cases::CharacterUseCases,
    pub intervention: use_cases::InterventionUseCases,
}

/// Outbound collaborators the engine talks to.
pub struct Collaborators {
    pub cache: Arc<dyn CachePort>,
    pub narrator: Arc<dyn NarrativePort>,
    pub notifiers: Vec<Arc<dyn NotifierPort>>,
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(repositories: Repositories, collaborators: Collaborators, config: EngineConfig) -> Self {
        let Collaborators {
            cache,
            narrator,
            notifiers,
            clock,
            random,
        } = collaborators;

        let rules = ConstraintRules {
            enforce_class_race: config.enforce_class_race_uniqueness,
            max_per_player: config.max_characters_per_player,
        };
        let fanout = Arc::new(NotificationFanout::new(notifiers));
        tracing::info!(
            channels = fanout.channel_count(),
            max_characters = rules.max_per_player,
            enforce_class_race = rules.enforce_class_race,
            "Engine configured"
        );

        // Entities
        let character = Arc::new(entities::Character::new(
            repositories.character.clone(),
            clock.clone(),
            rules,
        ));
        let sessions = Arc::new(entities::Session::new(
            cache,
            clock.clone(),
            config.session_idle_timeout,
        ));
        let interventions = Arc::new(entities::Intervention::new(
            repositories.intervention.clone(),
            clock.clone(),
            fanout,
        ));
        let dice = Arc::new(entities::Dice::new(random.clone()));
        let escalation = Arc::new(entities::Escalation::new(
            EscalationRules::new(config.escalation.clone()),
            repositories.intervention.clone(),
            random,
        ));

        // Use cases
        let roll_character = Arc::new(use_cases::character::RollCharacter::new(
            character.clone(),
            dice.clone(),
        ));
        let handle_message = Arc::new(use_cases::message::HandleMessage::new(
            sessions.clone(),
            character.clone(),
            dice,
            escalation,
            interventions.clone(),
            roll_character.clone(),
            narrator,
            clock,
        ));
        let resolve_intervention = Arc::new(use_cases::intervention::ResolveIntervention::new(
            interventions.clone(),
            sessions.clone(),
        ));

        let use_cases = UseCases {
            message: use_cases::MessageUseCases::new(handle_message),
            character: use_cases::CharacterUseCases::new(roll_character),
            intervention: use_cases::InterventionUseCases::new(resolve_intervention),
        };

        Self {
            repositories,
            use_cases,
            characters: character,
            sessions,
            interventions,
            config,
        }
    }
}
