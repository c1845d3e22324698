//! Handle one inbound `(player, chat, text)` message.
//!
//! Commands are answered directly. Free text from a player with an active
//! character is checked by the escalation detector first and then either
//! handed to a human or narrated.

use std::sync::Arc;

use chatgm_domain::{
    Ability, Character, CharacterDraft, ErrorCode, InterventionId, Race, Session, SessionState,
};

use super::command::{Command, CreateArgs, CREATE_USAGE, ROLL_USAGE};
use crate::entities::{self, CharacterError, Dice, InterventionError, SessionError};
use crate::infrastructure::ports::{ClockPort, NarrativeContext, NarrativePort, NarrativePurpose};
use crate::use_cases::character::{RollCharacter, RollCharacterError};

const HOLDING_LINE: &str = "Complex situation detected. Waiting for the Game Master...";
const FOLLOW_UP_LINE: &str = "A Game Master is handling this chat. Your message has been passed on.";
const ACTION_FALLBACK: &str = "The Game Master pauses for a moment. Try rephrasing your action or use a specific command.";
const NOT_STARTED_LINE: &str = "The game hasn't started in this chat yet. Use /start to join.";
const NO_CHARACTER_LINE: &str = "You need to create a character first! Use /create auto or /create <name> <race> <class>.";

const HELP_TEXT: &str = "Commands:\n\
    /start - join the game\n\
    /create auto - roll a random character\n\
    /create <name> <race> <class> - create your character\n\
    /status - show your character\n\
    /roll <dice> [adv|dis] - roll dice, e.g. /roll 1d20+5\n\
    /mode <active|paused|combat|exploration|social> - change the scene mode\n\
    /help - show this help\n\
    Anything else is your character's action.";

#[derive(Debug, thiserror::Error)]
pub enum HandleMessageError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Character(#[from] CharacterError),
    #[error(transparent)]
    Intervention(#[from] InterventionError),
}

impl ErrorCode for HandleMessageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Session(e) => e.code(),
            Self::Character(e) => e.code(),
            Self::Intervention(e) => e.code(),
        }
    }
}

/// Text to post back into the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Set when this message opened an intervention.
    pub escalated: Option<InterventionId>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            escalated: None,
        }
    }
}

/// Use case for processing an inbound chat message.
pub struct HandleMessage {
    session: Arc<entities::Session>,
    character: Arc<entities::Character>,
    dice: Arc<Dice>,
    escalation: Arc<entities::Escalation>,
    intervention: Arc<entities::Intervention>,
    roll_character: Arc<RollCharacter>,
    narrator: Arc<dyn NarrativePort>,
    clock: Arc<dyn ClockPort>,
}

impl HandleMessage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<entities::Session>,
        character: Arc<entities::Character>,
        dice: Arc<Dice>,
        escalation: Arc<entities::Escalation>,
        intervention: Arc<entities::Intervention>,
        roll_character: Arc<RollCharacter>,
        narrator: Arc<dyn NarrativePort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            session,
            character,
            dice,
            escalation,
            intervention,
            roll_character,
            narrator,
            clock,
        }
    }

    pub async fn execute(
        &self,
        player_id: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Reply, HandleMessageError> {
        let now = self.clock.now();
        let (session, _) = self
            .session
            .update(chat_id, |session| {
                session.record_activity(now);
                Ok(())
            })
            .await?;

        let Some(command) = Command::parse(text) else {
            return self.handle_action(player_id, session, text.trim()).await;
        };
        tracing::debug!(chat_id = %chat_id, player_id = %player_id, command = ?command, "Command received");

        match command {
            Command::Start => self.start(player_id, chat_id).await,
            Command::Create(args) => self.create(player_id, &session, args).await,
            Command::Status => self.status(player_id, &session).await,
            Command::Roll { expression, mode } => {
                let name = self
                    .character
                    .find_active(player_id, session.id())
                    .await?
                    .map_or_else(|| "Player".to_string(), |c| c.name().to_string());
                match self.dice.roll(&expression, mode) {
                    Ok(result) => Ok(Reply::text(format!("{name} rolled {}", result.breakdown()))),
                    Err(e) => Ok(Reply::text(format!("Dice error: {e}\n{ROLL_USAGE}"))),
                }
            }
            Command::Mode(state) => self.change_mode(chat_id, &state).await,
            Command::Help => Ok(Reply::text(HELP_TEXT)),
            Command::Usage(usage) => Ok(Reply::text(usage)),
            Command::Unknown(name) => Ok(Reply::text(format!(
                "Unknown command: {name}\nType /help to see the available commands."
            ))),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn start(&self, player_id: &str, chat_id: &str) -> Result<Reply, HandleMessageError> {
        let player = player_id.to_string();
        let (session, started) = self
            .session
            .update(chat_id, move |session| {
                session.join(player);
                if session.state() == SessionState::Inactive {
                    session.transition(SessionState::Active)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .await?;

        let mut text = format!("Welcome to the table!\n\n{HELP_TEXT}");
        if started {
            tracing::info!(chat_id = %chat_id, "Adventure started");
            let intro = self
                .narrate(NarrativePurpose::SceneIntro, &session, None, "")
                .await
                .unwrap_or_else(|| {
                    format!(
                        "Your adventure begins at {}.",
                        session.world_state().location().unwrap_or("an unknown place")
                    )
                });
            text.push_str(&format!("\n\nNarrator: {intro}"));
        }
        Ok(Reply::text(text))
    }

    async fn create(
        &self,
        player_id: &str,
        session: &Session,
        args: CreateArgs,
    ) -> Result<Reply, HandleMessageError> {
        if self.character.find_active(player_id, session.id()).await?.is_some() {
            return Ok(Reply::text(
                "You already have a character in this session. Use /status to see it.",
            ));
        }

        let created = match args {
            CreateArgs::Auto => self
                .roll_character
                .execute(player_id, session.id())
                .await
                .map_err(|e| match e {
                    RollCharacterError::Character(e) => e,
                }),
            CreateArgs::Manual { name, race, class } => {
                let abilities = race
                    .parse::<Race>()
                    .ok()
                    .map(|race| race.apply_bonuses(self.dice.roll_ability_scores()).as_array().map(i32::from));
                let draft = CharacterDraft {
                    abilities,
                    ..CharacterDraft::new(name, race, class)
                };
                self.character.create(player_id, session.id(), &draft).await
            }
        };

        match created {
            Ok(character) => Ok(Reply::text(format!(
                "Character created!\n\n{}\n\nUse /status to see the full sheet.",
                summary(&character)
            ))),
            Err(CharacterError::Storage(e)) => Err(CharacterError::Storage(e).into()),
            Err(CharacterError::DuplicateName { name, suggestions }) if !suggestions.is_empty() => {
                Ok(Reply::text(format!(
                    "The name '{name}' is already taken. Try: {}",
                    suggestions.join(", ")
                )))
            }
            Err(CharacterError::Validation(msg)) => {
                Ok(Reply::text(format!("{msg}\n{CREATE_USAGE}")))
            }
            Err(e) => Ok(Reply::text(e.to_string())),
        }
    }

    async fn status(&self, player_id: &str, session: &Session) -> Result<Reply, HandleMessageError> {
        let Some(character) = self.character.find_active(player_id, session.id()).await? else {
            return Ok(Reply::text(NO_CHARACTER_LINE));
        };

        let mut text = summary(&character);
        text.push_str(&format!(
            "\nXP: {}{}\nHealth: {}\nLocation: {}",
            character.experience(),
            character
                .experience_to_next_level()
                .map(|next| format!(" ({next} to next level)"))
                .unwrap_or_default(),
            character.health_status().as_str(),
            session.world_state().location().unwrap_or("unknown"),
        ));
        Ok(Reply::text(text))
    }

    async fn change_mode(&self, chat_id: &str, state: &str) -> Result<Reply, HandleMessageError> {
        let target = match state.parse::<SessionState>() {
            Ok(SessionState::WaitingOnHuman) | Err(_) => {
                return Ok(Reply::text(super::command::MODE_USAGE));
            }
            Ok(target) => target,
        };
        match self.session.transition(chat_id, target).await {
            Ok(session) => Ok(Reply::text(format!("Mode is now {}.", session.state()))),
            Err(SessionError::InvalidTransition { from, to }) => Ok(Reply::text(format!(
                "Cannot switch from {from} to {to} right now."
            ))),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Free-text actions
    // =========================================================================

    async fn handle_action(
        &self,
        player_id: &str,
        session: Session,
        action: &str,
    ) -> Result<Reply, HandleMessageError> {
        if action.is_empty() {
            return Ok(Reply::text("Type /help to see the available commands."));
        }
        if session.state() == SessionState::Inactive {
            return Ok(Reply::text(NOT_STARTED_LINE));
        }
        let Some(character) = self.character.find_active(player_id, session.id()).await? else {
            return Ok(Reply::text(NO_CHARACTER_LINE));
        };

        let assessment = self.escalation.assess(action, &session).await;
        if assessment.should_escalate() {
            return match assessment.trigger {
                Some(trigger) => self.escalate(player_id, &session, action, trigger).await,
                None => {
                    self.intervention
                        .notify_follow_up(session.chat_id(), player_id, action)
                        .await;
                    Ok(Reply::text(FOLLOW_UP_LINE))
                }
            };
        }

        let text = self
            .narrate(NarrativePurpose::PlayerAction, &session, Some(character), action)
            .await
            .unwrap_or_else(|| ACTION_FALLBACK.to_string());
        Ok(Reply::text(format!("GM: {text}")))
    }

    async fn escalate(
        &self,
        player_id: &str,
        session: &Session,
        action: &str,
        trigger: chatgm_domain::TriggerType,
    ) -> Result<Reply, HandleMessageError> {
        let chat_id = session.chat_id();
        let opened = match self.intervention.request(session, player_id, action, trigger).await {
            Ok(intervention) => Some(intervention),
            Err(e) => {
                tracing::error!(chat_id = %chat_id, error = %e, "Could not record intervention");
                self.intervention
                    .notify_error(chat_id, &e.to_string(), &format!("player {player_id}: \"{action}\""))
                    .await;
                None
            }
        };

        // The intervention is already pending, so humans hear about it even
        // when the session itself could not be handed over.
        if let Err(e) = self.session.escalate(chat_id).await {
            tracing::error!(chat_id = %chat_id, error = %e, "Could not hand session to a human");
            self.intervention
                .notify_error(chat_id, &e.to_string(), &format!("escalating player {player_id}: \"{action}\""))
                .await;
        }

        let escalated = match opened {
            Some(intervention) => {
                self.intervention.notify(&intervention).await;
                Some(intervention.id())
            }
            None => None,
        };
        Ok(Reply {
            text: HOLDING_LINE.to_string(),
            escalated,
        })
    }

    /// Narrative text, or `None` when the narrator failed.
    async fn narrate(
        &self,
        purpose: NarrativePurpose,
        session: &Session,
        character: Option<Character>,
        action: &str,
    ) -> Option<String> {
        let context = NarrativeContext {
            purpose,
            session: session.clone(),
            character,
            action: action.to_string(),
        };
        match self.narrator.narrate(&context).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(chat_id = %session.chat_id(), error = %e, "Narrative failed, using fallback");
                None
            }
        }
    }
}

fn summary(character: &Character) -> String {
    let abilities = Ability::ALL
        .iter()
        .map(|ability| {
            format!(
                "{} {} ({:+})",
                ability.abbreviation(),
                character.abilities().get(*ability),
                character.ability_modifier(*ability)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} - level {} {} {}\nHP: {}/{} | AC: {}\n{}",
        character.name(),
        character.level(),
        character.race(),
        character.class(),
        character.hit_points_current(),
        character.hit_points_max(),
        character.armor_class(),
        abilities,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EscalationRules;
    use crate::infrastructure::cache::TtlCache;
    use crate::infrastructure::clock::{FixedClock, SequenceRandom};
    use crate::infrastructure::memory::InMemoryRepositories;
    use crate::infrastructure::notify::NotificationFanout;
    use crate::infrastructure::ports::{
        CacheError, CachePort, ConstraintRules, MockCachePort, MockNarrativePort, MockNotifierPort,
        NarrativeError, NotifierPort,
    };
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Fixture {
        use_case: HandleMessage,
        sessions: Arc<entities::Session>,
    }

    fn fixture(narrator: MockNarrativePort, notices: usize) -> Fixture {
        let clock = Arc::new(FixedClock(Utc::now()));
        let cache: Arc<TtlCache<String, String>> = Arc::new(TtlCache::new(clock.clone()));
        fixture_with(narrator, cache, clock, |notifier| {
            notifier.expect_notify().times(notices).returning(|_| Ok(()));
        })
    }

    fn fixture_with(
        narrator: MockNarrativePort,
        cache: Arc<dyn CachePort>,
        clock: Arc<FixedClock>,
        expect_notices: impl FnOnce(&mut MockNotifierPort),
    ) -> Fixture {
        let random = Arc::new(SequenceRandom::new([]));
        let repos = InMemoryRepositories::new(10);

        let mut notifier = MockNotifierPort::new();
        notifier.expect_channel().returning(|| "test".to_string());
        expect_notices(&mut notifier);
        let channels: Vec<Arc<dyn NotifierPort>> = vec![Arc::new(notifier)];

        let sessions = Arc::new(entities::Session::new(cache, clock.clone(), Duration::from_secs(600)));
        let character = Arc::new(entities::Character::new(
            repos.character.clone(),
            clock.clone(),
            ConstraintRules {
                enforce_class_race: true,
                max_per_player: 3,
            },
        ));
        let dice = Arc::new(Dice::new(random.clone()));
        let escalation = Arc::new(entities::Escalation::new(
            EscalationRules::default(),
            repos.intervention.clone(),
            random,
        ));
        let intervention = Arc::new(entities::Intervention::new(
            repos.intervention.clone(),
            clock.clone(),
            Arc::new(NotificationFanout::new(channels)),
        ));
        let roll_character = Arc::new(RollCharacter::new(character.clone(), dice.clone()));

        Fixture {
            use_case: HandleMessage::new(
                sessions.clone(),
                character,
                dice,
                escalation,
                intervention,
                roll_character,
                Arc::new(narrator),
                clock,
            ),
            sessions,
        }
    }

    fn narrator_ok() -> MockNarrativePort {
        let mut narrator = MockNarrativePort::new();
        narrator
            .expect_narrate()
            .returning(|ctx| Ok(format!("narrated {:?}", ctx.purpose)));
        narrator
    }

    #[tokio::test]
    async fn start_activates_session_once() {
        let f = fixture(narrator_ok(), 0);
        let first = f.use_case.execute("alice", "chat-1", "/start").await.unwrap();
        assert!(first.text.contains("Narrator: narrated SceneIntro"));

        let second = f.use_case.execute("bob", "chat-1", "/start").await.unwrap();
        assert!(!second.text.contains("Narrator:"));

        let session = f.sessions.get_or_create("chat-1").await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.players().len(), 2);
    }

    /// Map-backed cache that refuses to store a session waiting on a human.
    fn cache_rejecting_escalation() -> MockCachePort {
        let entries: Arc<Mutex<HashMap<String, String>>> = Arc::default();
        let mut cache = MockCachePort::new();
        let read = entries.clone();
        cache
            .expect_get()
            .returning(move |key| Ok(read.lock().unwrap().get(key).cloned()));
        cache.expect_set().returning(move |key, value, _| {
            if value.contains("waiting_on_human") {
                return Err(CacheError::backend("set", "connection reset"));
            }
            entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        });
        cache
    }

    #[tokio::test]
    async fn free_text_needs_a_started_game() {
        let f = fixture(narrator_ok(), 0);
        f.use_case.execute("alice", "chat-1", "/create auto").await.unwrap();

        let reply = f.use_case.execute("alice", "chat-1", "I want a human gm").await.unwrap();
        assert_eq!(reply.text, NOT_STARTED_LINE);
        assert_eq!(reply.escalated, None);

        let session = f.sessions.get_or_create("chat-1").await.unwrap();
        assert_eq!(session.state(), SessionState::Inactive);
    }

    #[tokio::test]
    async fn free_text_needs_a_character() {
        let f = fixture(narrator_ok(), 0);
        f.use_case.execute("alice", "chat-1", "/start").await.unwrap();
        let reply = f.use_case.execute("alice", "chat-1", "I open the door").await.unwrap();
        assert_eq!(reply.text, NO_CHARACTER_LINE);
    }

    #[tokio::test]
    async fn create_then_act() {
        let f = fixture(narrator_ok(), 0);
        let created = f
            .use_case
            .execute("alice", "chat-1", "/create aria elf wizard")
            .await
            .unwrap();
        assert!(created.text.contains("Aria - level 1 Elf Wizard"));

        let again = f.use_case.execute("alice", "chat-1", "/create auto").await.unwrap();
        assert!(again.text.starts_with("You already have a character"));

        let reply = f.use_case.execute("alice", "chat-1", "I open the door").await.unwrap();
        assert_eq!(reply.text, "GM: narrated PlayerAction");
        assert_eq!(reply.escalated, None);
    }

    #[tokio::test]
    async fn narrative_failure_uses_fallback() {
        let mut narrator = MockNarrativePort::new();
        narrator
            .expect_narrate()
            .returning(|_| Err(NarrativeError::RequestFailed("down".to_string())));
        let f = fixture(narrator, 0);
        f.use_case.execute("alice", "chat-1", "/start").await.unwrap();
        f.use_case.execute("alice", "chat-1", "/create auto").await.unwrap();

        let reply = f.use_case.execute("alice", "chat-1", "I open the door").await.unwrap();
        assert_eq!(reply.text, format!("GM: {ACTION_FALLBACK}"));
    }

    #[tokio::test]
    async fn keyword_escalates_and_follow_ups_are_forwarded() {
        let f = fixture(narrator_ok(), 2);
        f.use_case.execute("alice", "chat-1", "/start").await.unwrap();
        f.use_case.execute("alice", "chat-1", "/create auto").await.unwrap();

        let reply = f
            .use_case
            .execute("alice", "chat-1", "I want to talk to a human gm")
            .await
            .unwrap();
        assert_eq!(reply.text, HOLDING_LINE);
        assert!(reply.escalated.is_some());
        assert!(f.sessions.get_or_create("chat-1").await.unwrap().is_waiting_on_human());

        let follow_up = f.use_case.execute("alice", "chat-1", "hello?").await.unwrap();
        assert_eq!(follow_up.text, FOLLOW_UP_LINE);
        assert_eq!(follow_up.escalated, None);
    }

    #[tokio::test]
    async fn intervention_is_announced_when_session_write_fails() {
        let notices: Arc<Mutex<Vec<String>>> = Arc::default();
        let seen = notices.clone();
        let f = fixture_with(
            narrator_ok(),
            Arc::new(cache_rejecting_escalation()),
            Arc::new(FixedClock(Utc::now())),
            move |notifier| {
                notifier.expect_notify().returning(move |notice| {
                    seen.lock().unwrap().push(notice.to_string());
                    Ok(())
                });
            },
        );
        f.use_case.execute("alice", "chat-1", "/start").await.unwrap();
        f.use_case.execute("alice", "chat-1", "/create auto").await.unwrap();

        let reply = f
            .use_case
            .execute("alice", "chat-1", "I disagree, the rulebook says otherwise")
            .await
            .unwrap();
        assert_eq!(reply.text, HOLDING_LINE);
        assert!(reply.escalated.is_some());

        let notices = notices.lock().unwrap().clone();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].starts_with("System error"));
        assert!(notices[0].contains("connection reset"));
        assert!(notices[1].contains("Rules dispute"));

        // The pending intervention keeps later messages with the humans.
        let follow_up = f.use_case.execute("alice", "chat-1", "hello?").await.unwrap();
        assert_eq!(follow_up.text, FOLLOW_UP_LINE);
    }

    #[tokio::test]
    async fn roll_and_usage_replies() {
        let f = fixture(narrator_ok(), 0);
        let rolled = f.use_case.execute("alice", "chat-1", "/roll 2d6+3").await.unwrap();
        assert_eq!(rolled.text, "Player rolled 2d6 [1, 1] + 3 = 5");

        let bad = f.use_case.execute("alice", "chat-1", "/roll 3d7").await.unwrap();
        assert!(bad.text.starts_with("Dice error: Unsupported die size d7"));

        let unknown = f.use_case.execute("alice", "chat-1", "/dance").await.unwrap();
        assert!(unknown.text.starts_with("Unknown command: /dance"));
    }

    #[tokio::test]
    async fn mode_follows_state_graph() {
        let f = fixture(narrator_ok(), 0);
        let early = f.use_case.execute("alice", "chat-1", "/mode combat").await.unwrap();
        assert_eq!(early.text, "Cannot switch from inactive to combat right now.");

        f.use_case.execute("alice", "chat-1", "/start").await.unwrap();
        let combat = f.use_case.execute("alice", "chat-1", "/mode combat").await.unwrap();
        assert_eq!(combat.text, "Mode is now combat.");

        let waiting = f.use_case.execute("alice", "chat-1", "/mode waiting").await.unwrap();
        assert!(waiting.text.starts_with("Usage: /mode"));
    }

    #[tokio::test]
    async fn duplicate_name_offers_suggestions() {
        let f = fixture(narrator_ok(), 0);
        f.use_case
            .execute("alice", "chat-1", "/create Gandalf human wizard")
            .await
            .unwrap();
        let reply = f
            .use_case
            .execute("bob", "chat-1", "/create gandalf elf wizard")
            .await
            .unwrap();
        assert!(reply.text.starts_with("The name 'Gandalf' is already taken. Try: Gandalf 2"));
    }
}
