//! Escalation detection: decides whether a player message is handed to a
//! human game master instead of being resolved automatically.
//!
//! The heuristic is checked in a fixed order: the session is already with
//! a human, an intervention is pending for the chat, a category keyword
//! matches, enough complexity signals add up, and finally a low-rate random
//! sample. Any failure while assessing escalates.

use std::sync::Arc;

use chatgm_domain::{Session, TriggerType};

use crate::infrastructure::ports::{InterventionRepo, RandomPort};
use crate::infrastructure::settings::EscalationThresholds;

// =============================================================================
// Rules
// =============================================================================

/// Keyword lists per trigger category, checked in list order.
#[derive(Debug, Clone)]
pub struct EscalationRules {
    categories: Vec<(TriggerType, Vec<String>)>,
    multi_action_markers: Vec<String>,
    thresholds: EscalationThresholds,
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_lowercase()).collect()
}

impl EscalationRules {
    /// Default English keyword lists with the given thresholds.
    pub fn new(thresholds: EscalationThresholds) -> Self {
        let categories = vec![
            (
                TriggerType::InappropriateContent,
                phrases(&[
                    "inappropriate",
                    "offensive",
                    "improper",
                    "violent",
                    "sexual",
                    "discrimination",
                    "prejudice",
                    "racist",
                ]),
            ),
            (
                TriggerType::HumanRequest,
                phrases(&[
                    "human gm",
                    "real gm",
                    "game master",
                    "human",
                    "gm",
                    "admin",
                    "moderator",
                    "support",
                ]),
            ),
            (
                TriggerType::PlayerConflict,
                phrases(&[
                    "i didn't like",
                    "unfair",
                    "favoritism",
                    "biased",
                    "cheating",
                    "cheat",
                    "conflict",
                    "argument",
                ]),
            ),
            (
                TriggerType::RulesDispute,
                phrases(&[
                    "rule",
                    "rules",
                    "that's not how it works",
                    "that's wrong",
                    "i dispute",
                    "i disagree",
                    "official rules",
                    "rulebook",
                    "errata",
                ]),
            ),
            (
                TriggerType::TechnicalError,
                phrases(&["bug", "error", "broken", "not working", "crashed", "glitch"]),
            ),
            (
                TriggerType::ComplexSituation,
                phrases(&["i don't understand", "complicated", "confusing", "intervention"]),
            ),
        ];
        Self {
            categories,
            multi_action_markers: phrases(&["at the same time", "simultaneously", "meanwhile", "multiple"]),
            thresholds,
        }
    }

    /// Replace the keyword list of one category.
    pub fn with_keywords(mut self, trigger: TriggerType, keywords: &[&str]) -> Self {
        let list = phrases(keywords);
        match self.categories.iter_mut().find(|(t, _)| *t == trigger) {
            Some((_, existing)) => *existing = list,
            None => self.categories.push((trigger, list)),
        }
        self
    }

    pub fn with_multi_action_markers(mut self, markers: &[&str]) -> Self {
        self.multi_action_markers = phrases(markers);
        self
    }

    pub fn thresholds(&self) -> &EscalationThresholds {
        &self.thresholds
    }

    /// First category with a keyword present as a whole word or phrase.
    pub fn keyword_trigger(&self, message: &str) -> Option<(TriggerType, &str)> {
        let tokens = tokenize(message);
        self.categories.iter().find_map(|(trigger, keywords)| {
            keywords
                .iter()
                .find(|keyword| contains_phrase(&tokens, keyword))
                .map(|keyword| (*trigger, keyword.as_str()))
        })
    }

    /// Structural complexity signals present in `message`.
    pub fn complexity_signals(&self, message: &str) -> Vec<String> {
        let tokens = tokenize(message);
        let mut signals = Vec::new();
        if tokens.len() > self.thresholds.max_words {
            signals.push(format!("{} words", tokens.len()));
        }
        let questions = message.matches('?').count();
        if questions > self.thresholds.max_question_marks {
            signals.push(format!("{questions} questions"));
        }
        for marker in &self.multi_action_markers {
            if contains_phrase(&tokens, marker) {
                signals.push(format!("'{marker}'"));
            }
        }
        signals
    }
}

impl Default for EscalationRules {
    fn default() -> Self {
        Self::new(EscalationThresholds::default())
    }
}

/// Lowercased words; apostrophes inside a word are kept.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words = tokenize(phrase);
    if words.is_empty() || words.len() > tokens.len() {
        return false;
    }
    tokens.windows(words.len()).any(|window| window == words.as_slice())
}

// =============================================================================
// Assessment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AutoResolve,
    Escalate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub decision: Decision,
    /// Category for a new intervention. `None` when the message should go
    /// to a human who already holds the session.
    pub trigger: Option<TriggerType>,
    pub reason: String,
}

impl Assessment {
    fn auto_resolve() -> Self {
        Self {
            decision: Decision::AutoResolve,
            trigger: None,
            reason: "no escalation signal".to_string(),
        }
    }

    fn escalate(trigger: Option<TriggerType>, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Escalate,
            trigger,
            reason: reason.into(),
        }
    }

    pub fn should_escalate(&self) -> bool {
        self.decision == Decision::Escalate
    }
}

/// Escalation entity operations.
pub struct Escalation {
    rules: EscalationRules,
    interventions: Arc<dyn InterventionRepo>,
    random: Arc<dyn RandomPort>,
}

impl Escalation {
    pub fn new(
        rules: EscalationRules,
        interventions: Arc<dyn InterventionRepo>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            rules,
            interventions,
            random,
        }
    }

    pub fn rules(&self) -> &EscalationRules {
        &self.rules
    }

    pub async fn assess(&self, message: &str, session: &Session) -> Assessment {
        let assessment = self.evaluate(message, session).await;
        if assessment.should_escalate() {
            tracing::info!(
                chat_id = %session.chat_id(),
                trigger = ?assessment.trigger,
                reason = %assessment.reason,
                "Message escalated"
            );
        }
        assessment
    }

    pub async fn should_escalate(&self, message: &str, session: &Session) -> bool {
        self.assess(message, session).await.should_escalate()
    }

    async fn evaluate(&self, message: &str, session: &Session) -> Assessment {
        if session.is_waiting_on_human() {
            return Assessment::escalate(None, "session is waiting on a human");
        }

        match self.interventions.pending_for_chat(session.chat_id()).await {
            Ok(pending) if !pending.is_empty() => {
                return Assessment::escalate(None, "an intervention is already pending");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(chat_id = %session.chat_id(), error = %e, "Pending intervention lookup failed, escalating");
                return Assessment::escalate(
                    Some(TriggerType::TechnicalError),
                    format!("escalation check failed: {e}"),
                );
            }
        }

        if let Some((trigger, keyword)) = self.rules.keyword_trigger(message) {
            return Assessment::escalate(Some(trigger), format!("keyword '{keyword}'"));
        }

        let signals = self.rules.complexity_signals(message);
        if !signals.is_empty() && signals.len() >= self.rules.thresholds.min_complexity_signals {
            return Assessment::escalate(
                Some(TriggerType::ComplexSituation),
                format!("complexity: {}", signals.join(", ")),
            );
        }

        let sample_rate = self.rules.thresholds.sample_rate;
        if sample_rate > 0.0 && self.random.gen_unit() < sample_rate {
            return Assessment::escalate(Some(TriggerType::AiUncertainty), "random quality sample");
        }

        Assessment::auto_resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{FixedRandom, SequenceRandom};
    use crate::infrastructure::ports::{MockInterventionRepo, RepoError};
    use chatgm_domain::{Intervention, InterventionId, SessionId, SessionState};
    use chrono::Utc;

    fn session() -> Session {
        let mut session = Session::new(SessionId::new(), "chat-1", Utc::now());
        session.transition(SessionState::Active).unwrap();
        session
    }

    fn no_pending() -> MockInterventionRepo {
        let mut repo = MockInterventionRepo::new();
        repo.expect_pending_for_chat().returning(|_| Ok(Vec::new()));
        repo
    }

    fn detector(repo: MockInterventionRepo) -> Escalation {
        Escalation::new(EscalationRules::default(), Arc::new(repo), Arc::new(SequenceRandom::new([])))
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let rules = EscalationRules::default();
        assert_eq!(
            rules.keyword_trigger("Can I speak to a HUMAN please").map(|(t, _)| t),
            Some(TriggerType::HumanRequest)
        );
        assert_eq!(rules.keyword_trigger("I search the humanoid's pockets"), None);
        assert_eq!(rules.keyword_trigger("The ruler of the keep greets us"), None);
        assert_eq!(
            rules.keyword_trigger("That's not how it works!").map(|(t, _)| t),
            Some(TriggerType::RulesDispute)
        );
    }

    #[test]
    fn categories_are_checked_in_priority_order() {
        let rules = EscalationRules::default();
        let (trigger, _) = rules
            .keyword_trigger("this rule is offensive")
            .unwrap();
        assert_eq!(trigger, TriggerType::InappropriateContent);
    }

    #[test]
    fn keyword_lists_are_configurable() {
        let rules = EscalationRules::default().with_keywords(TriggerType::TechnicalError, &["lag"]);
        assert_eq!(
            rules.keyword_trigger("so much lag").map(|(t, _)| t),
            Some(TriggerType::TechnicalError)
        );
        assert_eq!(rules.keyword_trigger("the bridge is broken"), None);
    }

    #[test]
    fn complexity_signals_are_counted() {
        let rules = EscalationRules::default();
        assert!(rules.complexity_signals("I open the door").is_empty());
        let signals = rules.complexity_signals("Where? Why? How? Meanwhile I cast a spell");
        assert_eq!(signals.len(), 2);
    }

    #[tokio::test]
    async fn keyword_escalates_regardless_of_length() {
        let escalation = detector(no_pending());
        let short = escalation.assess("gm", &session()).await;
        assert_eq!(short.trigger, Some(TriggerType::HumanRequest));

        let long = format!("{} then I ask for a human gm", "walk ".repeat(200));
        assert!(escalation.should_escalate(&long, &session()).await);
    }

    #[tokio::test]
    async fn one_complexity_signal_is_not_enough() {
        let escalation = detector(no_pending());
        let assessment = escalation.assess("Where? Why? How is this door locked?", &session()).await;
        assert_eq!(assessment.decision, Decision::AutoResolve);

        let assessment = escalation
            .assess("I attack the orc and simultaneously dodge. Meanwhile I shout.", &session())
            .await;
        assert_eq!(assessment.trigger, Some(TriggerType::ComplexSituation));
    }

    #[tokio::test]
    async fn random_sample_escalates_clean_message() {
        let escalation = Escalation::new(
            EscalationRules::default(),
            Arc::new(no_pending()),
            Arc::new(SequenceRandom::new([]).with_units([0.005])),
        );
        let assessment = escalation.assess("I open the door", &session()).await;
        assert_eq!(assessment.trigger, Some(TriggerType::AiUncertainty));
    }

    #[tokio::test]
    async fn zero_sample_rate_never_samples() {
        let thresholds = EscalationThresholds {
            sample_rate: 0.0,
            ..EscalationThresholds::default()
        };
        let escalation = Escalation::new(
            EscalationRules::new(thresholds),
            Arc::new(no_pending()),
            Arc::new(FixedRandom(1)),
        );
        assert!(!escalation.should_escalate("I open the door", &session()).await);
    }

    #[tokio::test]
    async fn waiting_session_routes_to_human() {
        let mut repo = MockInterventionRepo::new();
        repo.expect_pending_for_chat().never();
        let escalation = detector(repo);

        let mut waiting = session();
        waiting.escalate().unwrap();
        let assessment = escalation.assess("I open the door", &waiting).await;
        assert!(assessment.should_escalate());
        assert_eq!(assessment.trigger, None);
    }

    #[tokio::test]
    async fn pending_intervention_routes_to_human() {
        let active = session();
        let pending = Intervention::new(
            InterventionId::new(),
            &active,
            "alice",
            "earlier",
            TriggerType::RulesDispute,
            Utc::now(),
        );
        let mut repo = MockInterventionRepo::new();
        repo.expect_pending_for_chat()
            .returning(move |_| Ok(vec![pending.clone()]));
        let escalation = detector(repo);

        let assessment = escalation.assess("I open the door", &active).await;
        assert!(assessment.should_escalate());
        assert_eq!(assessment.trigger, None);
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let mut repo = MockInterventionRepo::new();
        repo.expect_pending_for_chat()
            .returning(|_| Err(RepoError::database("pending_for_chat", "unavailable")));
        let escalation = detector(repo);

        let assessment = escalation.assess("I open the door", &session()).await;
        assert_eq!(assessment.decision, Decision::Escalate);
        assert_eq!(assessment.trigger, Some(TriggerType::TechnicalError));
    }
}
