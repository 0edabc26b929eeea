//! Keyword-heuristic strategy.
//!
//! Each answer is classified by case-insensitive substring match:
//! - completion keywords ("done", "that's all") capture the answer and
//!   complete the topic;
//! - move-on keywords ("next", "move on") complete it without capture;
//! - anything else gets a templated follow-up that quotes the answer.
//!
//! Once `follow_up_threshold` follow-ups have been asked, the next answer is
//! captured and the topic completed whatever it says.

use regex::Regex;
use tracing::debug;

use super::{Decision, DialogueResolver, DialogueTurn, Reply, Strategy};
use crate::error::ConfigError;
use crate::session::model::TopicStatus;

/// Default number of follow-ups before an answer is forced to complete.
pub const DEFAULT_FOLLOW_UP_THRESHOLD: u32 = 2;

/// Longest quoted excerpt in a templated follow-up, in characters.
const EXCERPT_CHARS: usize = 60;

const FOLLOW_UP_TEMPLATES: &[&str] = &[
    "You mentioned \"{excerpt}\". Could you walk me through a concrete example of how that plays out?",
    "That helps. What would someone new to this most likely get wrong about \"{excerpt}\"?",
];

/// Keyword sets and turn limit for the heuristic strategy.
#[derive(Debug, Clone)]
pub struct HeuristicConfig {
    pub follow_up_threshold: u32,
    pub complete_keywords: Vec<String>,
    pub move_on_keywords: Vec<String>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            follow_up_threshold: DEFAULT_FOLLOW_UP_THRESHOLD,
            complete_keywords: vec!["done".to_string(), "that's all".to_string()],
            move_on_keywords: vec!["next".to_string(), "move on".to_string()],
        }
    }
}

/// Classified participant intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Capture this answer and complete the topic.
    Complete,
    /// Complete the topic without capturing this answer.
    MoveOn,
    /// A regular answer.
    Answer,
}

/// Keyword-driven dialogue.
#[derive(Debug, Clone)]
pub struct HeuristicResolver {
    follow_up_threshold: u32,
    complete: Option<Regex>,
    move_on: Option<Regex>,
}

/// Compile a case-insensitive alternation of literal keywords.
fn keyword_regex(key: &str, keywords: &[String]) -> Result<Option<Regex>, ConfigError> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| regex::escape(&normalize(k)))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    let pattern = format!("(?i)(?:{})", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Fold typographic apostrophes so "that’s all" matches "that's all".
fn normalize(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}

/// Short single-line quote of an answer.
fn excerpt(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

impl HeuristicResolver {
    pub fn new(config: HeuristicConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            follow_up_threshold: config.follow_up_threshold,
            complete: keyword_regex("complete_keywords", &config.complete_keywords)?,
            move_on: keyword_regex("move_on_keywords", &config.move_on_keywords)?,
        })
    }

    /// Classify an answer. Completion keywords win over move-on keywords so
    /// an answer like "done, next" keeps its content.
    pub fn classify(&self, input: &str) -> Intent {
        let text = normalize(input);
        if self.complete.as_ref().is_some_and(|re| re.is_match(&text)) {
            Intent::Complete
        } else if self.move_on.as_ref().is_some_and(|re| re.is_match(&text)) {
            Intent::MoveOn
        } else {
            Intent::Answer
        }
    }

    /// Templated follow-up quoting the answer.
    pub fn follow_up_text(&self, input: &str, follow_ups_asked: u32) -> String {
        let template = FOLLOW_UP_TEMPLATES[follow_ups_asked as usize % FOLLOW_UP_TEMPLATES.len()];
        template.replace("{excerpt}", &excerpt(input))
    }

    pub fn follow_up_threshold(&self) -> u32 {
        self.follow_up_threshold
    }
}

impl Default for HeuristicResolver {
    fn default() -> Self {
        Self {
            follow_up_threshold: DEFAULT_FOLLOW_UP_THRESHOLD,
            complete: Regex::new(r"(?i)(?:done|that's all)").ok(),
            move_on: Regex::new(r"(?i)(?:next|move on)").ok(),
        }
    }
}

impl DialogueResolver for HeuristicResolver {
    fn strategy(&self) -> Strategy {
        Strategy::Heuristic
    }

    fn open_status(&self) -> TopicStatus {
        TopicStatus::InProgress
    }

    fn resolve(&self, turn: &DialogueTurn<'_>) -> Decision {
        if turn.follow_ups_asked >= self.follow_up_threshold {
            debug!(
                topic_id = %turn.topic.id,
                follow_ups = turn.follow_ups_asked,
                "Follow-up threshold reached"
            );
            return Decision::Complete;
        }
        match self.classify(turn.input) {
            Intent::Complete => Decision::Complete,
            Intent::MoveOn => Decision::MoveOn,
            Intent::Answer => Decision::FollowUp(Reply::Text(
                self.follow_up_text(turn.input, turn.follow_ups_asked),
            )),
        }
    }
}
