//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::dialogue::heuristic::DEFAULT_FOLLOW_UP_THRESHOLD;
use crate::dialogue::Strategy;
use crate::error::ConfigError;

/// Timing and wording of a session's assistant turns.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Simulated "assistant is thinking" delay before a reply lands.
    pub thinking_delay: Duration,
    /// Delay between completing a topic and opening the next one.
    pub advance_delay: Duration,
    /// Follow-up used when a topic has neither a scripted reply nor a
    /// static follow-up question.
    pub fallback_follow_up: String,
    /// Reply to a follow-up answer when nothing is scripted.
    pub acknowledgement: String,
    /// Interstitial between topics of the same group. `{topic}` is replaced.
    pub topic_transition: String,
    /// Interstitial when a group is finished. `{group}`, `{next_group}` and
    /// `{topic}` are replaced.
    pub group_transition: String,
    /// Appended once every topic is completed.
    pub completion_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thinking_delay: Duration::from_millis(1200),
            advance_delay: Duration::from_millis(1500),
            fallback_follow_up: "Could you say a bit more about that? A concrete example would help."
                .to_string(),
            acknowledgement:
                "Thank you, that's really useful. Continue whenever you're ready.".to_string(),
            topic_transition: "Great, let's move on to {topic}.".to_string(),
            group_transition: "You've completed {group}. Next up: {next_group}, starting with {topic}."
                .to_string(),
            completion_message:
                "That covers every topic. Thank you for taking the time to share your knowledge!"
                    .to_string(),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `ELICIT_THINKING_DELAY_MS` and
    /// `ELICIT_ADVANCE_DELAY_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = env_parse::<u64>("ELICIT_THINKING_DELAY_MS")? {
            config.thinking_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ELICIT_ADVANCE_DELAY_MS")? {
            config.advance_delay = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Builder: zero both delays.
    pub fn without_delays(mut self) -> Self {
        self.thinking_delay = Duration::ZERO;
        self.advance_delay = Duration::ZERO;
        self
    }
}

/// Who is being interviewed, recorded in the session summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub role: String,
    pub project: String,
}

/// Configuration of the `elicit` binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Catalog file. `None` uses the built-in demo catalog.
    pub catalog_path: Option<PathBuf>,
    /// Session summary registry file.
    pub registry_path: PathBuf,
    /// Directory the handoff document is written to.
    pub export_dir: PathBuf,
    /// Rolling log directory. `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
    pub strategy: Strategy,
    pub follow_up_threshold: u32,
    pub participant: Participant,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            registry_path: PathBuf::from("./data/sessions.json"),
            export_dir: PathBuf::from("./data/handoffs"),
            log_dir: None,
            strategy: Strategy::default(),
            follow_up_threshold: DEFAULT_FOLLOW_UP_THRESHOLD,
            participant: Participant {
                name: "Participant".to_string(),
                role: String::new(),
                project: "default".to_string(),
            },
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `ELICIT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            catalog_path: env_string("ELICIT_CATALOG").map(PathBuf::from),
            registry_path: env_string("ELICIT_REGISTRY")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_path),
            export_dir: env_string("ELICIT_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            log_dir: env_string("ELICIT_LOG_DIR").map(PathBuf::from),
            strategy: env_parse("ELICIT_STRATEGY")?.unwrap_or(defaults.strategy),
            follow_up_threshold: env_parse("ELICIT_FOLLOW_UP_THRESHOLD")?
                .unwrap_or(defaults.follow_up_threshold),
            participant: Participant {
                name: env_string("ELICIT_PARTICIPANT").unwrap_or(defaults.participant.name),
                role: env_string("ELICIT_ROLE").unwrap_or(defaults.participant.role),
                project: env_string("ELICIT_PROJECT").unwrap_or(defaults.participant.project),
            },
            session: SessionConfig::from_env()?,
        })
    }
}

/// Non-empty, trimmed environment variable.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable, if set.
fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
