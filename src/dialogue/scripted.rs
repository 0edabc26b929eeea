//! Scripted-table strategy: fixed replies keyed by `(topic, phase)`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Decision, DialogueResolver, DialogueTurn, Reply, Strategy};
use crate::catalog::Catalog;
use crate::session::model::DialoguePhase;

/// Table key phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptPhase {
    Initial,
    FollowUp,
}

/// Author-scripted dialogue. Two turns per topic: the first answer gets the
/// `Initial` reply and keeps the dialogue open, the second gets the
/// `FollowUp` reply and wraps the topic.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResolver {
    table: HashMap<(String, ScriptPhase), String>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from every topic's scripted responses.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut resolver = Self::new();
        for topic in catalog.topics() {
            if let Some(ref text) = topic.responses.initial {
                resolver.insert(&topic.id, ScriptPhase::Initial, text);
            }
            if let Some(ref text) = topic.responses.follow_up {
                resolver.insert(&topic.id, ScriptPhase::FollowUp, text);
            }
        }
        resolver
    }

    /// Builder: add a table entry.
    pub fn with_entry(mut self, topic_id: &str, phase: ScriptPhase, text: &str) -> Self {
        self.insert(topic_id, phase, text);
        self
    }

    pub fn insert(&mut self, topic_id: &str, phase: ScriptPhase, text: &str) {
        self.table
            .insert((topic_id.to_string(), phase), text.to_string());
    }

    /// Look up a reply. `None` means the caller falls back.
    pub fn lookup(&self, topic_id: &str, phase: ScriptPhase) -> Option<&str> {
        self.table
            .get(&(topic_id.to_string(), phase))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn reply(&self, topic_id: &str, phase: ScriptPhase) -> Reply {
        match self.lookup(topic_id, phase) {
            Some(text) => Reply::Text(text.to_string()),
            None => Reply::Fallback,
        }
    }
}

impl DialogueResolver for ScriptedResolver {
    fn strategy(&self) -> Strategy {
        Strategy::Scripted
    }

    fn resolve(&self, turn: &DialogueTurn<'_>) -> Decision {
        match turn.phase {
            DialoguePhase::AwaitingInitial => {
                Decision::FollowUp(self.reply(&turn.topic.id, ScriptPhase::Initial))
            }
            DialoguePhase::AwaitingFollowUp | DialoguePhase::Wrapped | DialoguePhase::Closed => {
                Decision::Wrap(self.reply(&turn.topic.id, ScriptPhase::FollowUp))
            }
        }
    }
}
