//! Engine configuration.
//!
//! Every knob the rules core reads lives here and is handed to each service
//! at construction. Values come from `CHATGM_*` environment variables; the
//! binary loads `.env` files first.

use std::str::FromStr;
use std::time::Duration;

use chatgm_domain::DEFAULT_MAX_CHARACTERS;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Thresholds for the escalation heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationThresholds {
    pub max_words: usize,
    pub max_question_marks: usize,
    pub min_complexity_signals: usize,
    /// Probability in `[0, 1]` of escalating an otherwise clean message.
    pub sample_rate: f64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            max_words: 50,
            max_question_marks: 2,
            min_complexity_signals: 2,
            sample_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_characters_per_player: u32,
    pub enforce_class_race_uniqueness: bool,
    pub session_idle_timeout: Duration,
    pub intervention_history_capacity: usize,
    pub escalation: EscalationThresholds,
    pub cache_sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_characters_per_player: DEFAULT_MAX_CHARACTERS,
            enforce_class_race_uniqueness: true,
            session_idle_timeout: Duration::from_secs(1800),
            intervention_history_capacity: 100,
            escalation: EscalationThresholds::default(),
            cache_sweep_interval: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let escalation = EscalationThresholds {
            max_words: read(&lookup, "CHATGM_ESCALATION_MAX_WORDS", defaults.escalation.max_words)?,
            max_question_marks: read(
                &lookup,
                "CHATGM_ESCALATION_MAX_QUESTION_MARKS",
                defaults.escalation.max_question_marks,
            )?,
            min_complexity_signals: read(
                &lookup,
                "CHATGM_ESCALATION_MIN_COMPLEXITY_SIGNALS",
                defaults.escalation.min_complexity_signals,
            )?,
            sample_rate: read(
                &lookup,
                "CHATGM_ESCALATION_SAMPLE_RATE",
                defaults.escalation.sample_rate,
            )?,
        };

        let config = Self {
            max_characters_per_player: read(
                &lookup,
                "CHATGM_MAX_CHARACTERS_PER_PLAYER",
                defaults.max_characters_per_player,
            )?,
            enforce_class_race_uniqueness: read_bool(
                &lookup,
                "CHATGM_ENFORCE_CLASS_RACE_UNIQUENESS",
                defaults.enforce_class_race_uniqueness,
            )?,
            session_idle_timeout: Duration::from_secs(read(
                &lookup,
                "CHATGM_SESSION_IDLE_TIMEOUT_SECS",
                defaults.session_idle_timeout.as_secs(),
            )?),
            intervention_history_capacity: read(
                &lookup,
                "CHATGM_INTERVENTION_HISTORY_CAPACITY",
                defaults.intervention_history_capacity,
            )?,
            escalation,
            cache_sweep_interval: Duration::from_secs(read(
                &lookup,
                "CHATGM_CACHE_SWEEP_INTERVAL_SECS",
                defaults.cache_sweep_interval.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_characters_per_player == 0 {
            return Err(invalid("CHATGM_MAX_CHARACTERS_PER_PLAYER", "0", "must be at least 1"));
        }
        if self.session_idle_timeout.is_zero() {
            return Err(invalid("CHATGM_SESSION_IDLE_TIMEOUT_SECS", "0", "must be at least 1"));
        }
        if self.cache_sweep_interval.is_zero() {
            return Err(invalid("CHATGM_CACHE_SWEEP_INTERVAL_SECS", "0", "must be at least 1"));
        }
        let rate = self.escalation.sample_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(invalid(
                "CHATGM_ESCALATION_SAMPLE_RATE",
                &rate.to_string(),
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn read<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, e.to_string())),
    }
}

fn read_bool<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(var, &raw, "expected true or false")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_characters_per_player, 3);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.escalation.max_words, 50);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("CHATGM_MAX_CHARACTERS_PER_PLAYER", "5"),
            ("CHATGM_ENFORCE_CLASS_RACE_UNIQUENESS", "off"),
            ("CHATGM_ESCALATION_SAMPLE_RATE", "0"),
            ("CHATGM_SESSION_IDLE_TIMEOUT_SECS", " 60 "),
        ])
        .unwrap();
        assert_eq!(config.max_characters_per_player, 5);
        assert!(!config.enforce_class_race_uniqueness);
        assert_eq!(config.escalation.sample_rate, 0.0);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = config_from(&[("CHATGM_MAX_CHARACTERS_PER_PLAYER", "three")]).unwrap_err();
        assert!(err.to_string().contains("CHATGM_MAX_CHARACTERS_PER_PLAYER"));

        assert!(config_from(&[("CHATGM_ESCALATION_SAMPLE_RATE", "1.5")]).is_err());
        assert!(config_from(&[("CHATGM_ENFORCE_CLASS_RACE_UNIQUENESS", "maybe")]).is_err());
        assert!(config_from(&[("CHATGM_MAX_CHARACTERS_PER_PLAYER", "0")]).is_err());
    }
}
