//! Dialogue resolvers: decide how the assistant answers a participant turn.
//!
//! Two interchangeable strategies sit behind [`DialogueResolver`]:
//! - [`ScriptedResolver`] looks replies up in an author-written table keyed
//!   by topic and phase.
//! - [`HeuristicResolver`] classifies free text by keyword and synthesizes
//!   templated follow-ups up to a fixed number of turns.
//!
//! Resolvers never touch session state. They return a [`Decision`] that the
//! session controller applies.

pub mod heuristic;
pub mod scripted;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::Topic;
use crate::error::ConfigError;
use crate::session::model::{DialoguePhase, TopicStatus};

pub use heuristic::{HeuristicConfig, HeuristicResolver, Intent};
pub use scripted::{ScriptPhase, ScriptedResolver};

/// One participant answer, as seen by a resolver.
#[derive(Debug, Clone, Copy)]
pub struct DialogueTurn<'a> {
    pub topic: &'a Topic,
    /// Phase the topic was in when the answer arrived.
    pub phase: DialoguePhase,
    /// The answer, already trimmed.
    pub input: &'a str,
    /// Follow-up questions already asked on this topic.
    pub follow_ups_asked: u32,
}

/// Assistant reply text, or a request to use the generic fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Fallback,
}

/// What the controller should do with a participant answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Capture the answer, reply, and keep the dialogue open.
    FollowUp(Reply),
    /// Capture the answer, reply, and wait for an explicit continue.
    Wrap(Reply),
    /// Capture the answer and complete the topic now.
    Complete,
    /// Complete the topic without capturing the answer.
    MoveOn,
}

/// A dialogue strategy.
pub trait DialogueResolver: Send + Sync {
    /// Strategy name for logs.
    fn strategy(&self) -> Strategy;

    /// Status given to a topic when it is opened.
    fn open_status(&self) -> TopicStatus {
        TopicStatus::Active
    }

    /// Decide the response to a participant answer.
    fn resolve(&self, turn: &DialogueTurn<'_>) -> Decision;
}

/// Which dialogue strategy a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Scripted,
    Heuristic,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Scripted
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scripted => write!(f, "scripted"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scripted" | "script" | "table" => Ok(Self::Scripted),
            "heuristic" | "keyword" => Ok(Self::Heuristic),
            other => Err(ConfigError::InvalidValue {
                key: "strategy".to_string(),
                message: format!("unknown dialogue strategy '{other}'"),
            }),
        }
    }
}
