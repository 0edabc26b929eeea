//! Session store: the canonical mutable session state.
//!
//! Every mutation is one named [`Transition`] applied through
//! [`SessionStore::apply`]. The store enforces the data invariants (status
//! never regresses except an uncaptured revert, at most one open topic, the
//! transcript is append-only, progress is always derived) and reports what
//! changed as [`SessionEvent`]s. A transition that would break an invariant
//! is ignored.
//!
//! Access gating and sequencing are the controller's job, not the store's.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::{
    DialoguePhase, Selection, SessionEvent, SessionPhase, TopicState, TopicStatus,
    TranscriptEntry,
};
use super::progress::{self, SessionProgress};
use crate::catalog::Catalog;

/// A single named mutation of the session store.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Leave the overview surface.
    Begin,
    /// Point the selection at a topic.
    Select { topic_id: String, review: bool },
    /// Drop the current selection.
    ClearSelection,
    /// Open a not-started topic with the given open status.
    OpenTopic { topic_id: String, status: TopicStatus },
    /// Return an open topic with nothing captured to not-started.
    RevertTopic { topic_id: String },
    /// Note that the opening question is in the transcript.
    MarkQuestionAsked { topic_id: String },
    SetDialoguePhase { topic_id: String, phase: DialoguePhase },
    /// Capture an answer: the first into `captured_response`, later ones
    /// into `captured_follow_up_response`. All are kept in `captures`.
    Capture { topic_id: String, text: String },
    RecordFollowUpAsked { topic_id: String },
    CompleteTopic { topic_id: String },
    Append(TranscriptEntry),
    /// Mark the assistant as thinking about a topic, or clear it.
    SetThinking { topic_id: Option<String> },
    ToggleGroup { group_id: String },
    ExpandGroup { group_id: String },
    /// Enter the terminal phase.
    Finish,
}

/// Serializable copy of the store for readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub topics: Vec<TopicState>,
    pub transcript: Vec<TranscriptEntry>,
    pub selection: Option<Selection>,
    pub thinking: Option<String>,
    pub expanded_groups: Vec<String>,
    pub phase: SessionPhase,
    pub progress: SessionProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn topic(&self, topic_id: &str) -> Option<&TopicState> {
        self.topics.iter().find(|t| t.id == topic_id)
    }
}

/// Mutable state of one session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    catalog: Arc<Catalog>,
    topics: Vec<TopicState>,
    transcript: Vec<TranscriptEntry>,
    selection: Option<Selection>,
    thinking: Option<String>,
    expanded: BTreeSet<String>,
    phase: SessionPhase,
    progress: SessionProgress,
    /// Bumped whenever the selection changes.
    epoch: u64,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionStore {
    /// Fresh state: every topic not started, first group expanded.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let topics: Vec<TopicState> = catalog
            .topics()
            .iter()
            .map(|t| TopicState::new(&t.id, &t.group_id))
            .collect();
        let progress = progress::calculate(&catalog, &topics);
        let expanded = catalog
            .groups()
            .first()
            .map(|g| g.id.clone())
            .into_iter()
            .collect();
        Self {
            catalog,
            topics,
            transcript: Vec::new(),
            selection: None,
            thinking: None,
            expanded,
            phase: SessionPhase::default(),
            progress,
            epoch: 0,
            completed_at: None,
        }
    }

    /// Apply one transition and return the observable changes it caused.
    ///
    /// Bookkeeping transitions (capture, dialogue phase, counters) change
    /// state without emitting events.
    pub fn apply(&mut self, transition: Transition) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match transition {
            Transition::Begin => {
                self.set_phase(SessionPhase::GroupSelection, &mut events);
            }
            Transition::Select { topic_id, review } => {
                if self.catalog.topic(&topic_id).is_none() {
                    warn!(topic_id = %topic_id, "Select of unknown topic ignored");
                    return events;
                }
                let selection = Selection { topic_id, review };
                if self.selection.as_ref() != Some(&selection) {
                    self.selection = Some(selection.clone());
                    self.epoch += 1;
                    events.push(SessionEvent::SelectionChanged {
                        selection: Some(selection),
                    });
                }
                let phase = if review {
                    SessionPhase::Review
                } else {
                    SessionPhase::Dialogue
                };
                self.set_phase(phase, &mut events);
            }
            Transition::ClearSelection => {
                if self.selection.take().is_some() {
                    self.epoch += 1;
                    events.push(SessionEvent::SelectionChanged { selection: None });
                    self.set_phase(SessionPhase::GroupSelection, &mut events);
                }
            }
            Transition::OpenTopic { topic_id, status } => {
                if !status.is_open() {
                    warn!(topic_id = %topic_id, %status, "OpenTopic with a non-open status ignored");
                    return events;
                }
                if let Some(other) = self.topics.iter().find(|t| t.status.is_open()) {
                    warn!(
                        topic_id = %topic_id,
                        open = %other.id,
                        "OpenTopic while another topic is open ignored"
                    );
                    return events;
                }
                self.set_status(&topic_id, status, &mut events);
            }
            Transition::RevertTopic { topic_id } => {
                let Some(topic) = self.topic(&topic_id) else {
                    return events;
                };
                if topic.has_capture() {
                    warn!(topic_id = %topic_id, "Revert of a topic with captured content ignored");
                    return events;
                }
                self.set_status(&topic_id, TopicStatus::NotStarted, &mut events);
            }
            Transition::MarkQuestionAsked { topic_id } => {
                if let Some(topic) = self.topic_mut(&topic_id) {
                    topic.question_asked = true;
                }
            }
            Transition::SetDialoguePhase { topic_id, phase } => {
                if let Some(topic) = self.topic_mut(&topic_id) {
                    if topic.status.is_completed() {
                        return events;
                    }
                    topic.phase = phase;
                }
            }
            Transition::Capture { topic_id, text } => {
                let Some(topic) = self.topic_mut(&topic_id) else {
                    return events;
                };
                if !topic.status.is_open() {
                    warn!(topic_id = %topic_id, status = %topic.status, "Capture on a closed topic ignored");
                    return events;
                }
                if topic.captured_response.is_none() {
                    topic.captured_response = Some(text.clone());
                } else {
                    topic.captured_follow_up_response = Some(text.clone());
                }
                topic.captures.push(text);
            }
            Transition::RecordFollowUpAsked { topic_id } => {
                if let Some(topic) = self.topic_mut(&topic_id) {
                    topic.follow_ups_asked += 1;
                }
            }
            Transition::CompleteTopic { topic_id } => {
                if self.set_status(&topic_id, TopicStatus::Completed, &mut events) {
                    if let Some(topic) = self.topic_mut(&topic_id) {
                        topic.phase = DialoguePhase::Closed;
                    }
                }
            }
            Transition::Append(entry) => {
                self.transcript.push(entry.clone());
                events.push(SessionEvent::EntryAppended { entry });
            }
            Transition::SetThinking { topic_id } => {
                if self.thinking != topic_id {
                    self.thinking = topic_id.clone();
                    events.push(SessionEvent::ThinkingChanged { topic_id });
                }
            }
            Transition::ToggleGroup { group_id } => {
                if self.catalog.group(&group_id).is_none() {
                    return events;
                }
                let expanded = if self.expanded.remove(&group_id) {
                    false
                } else {
                    self.expanded.insert(group_id.clone());
                    true
                };
                events.push(SessionEvent::GroupToggled { group_id, expanded });
            }
            Transition::ExpandGroup { group_id } => {
                if self.catalog.group(&group_id).is_some() && self.expanded.insert(group_id.clone())
                {
                    events.push(SessionEvent::GroupToggled {
                        group_id,
                        expanded: true,
                    });
                }
            }
            Transition::Finish => {
                if self.set_phase(SessionPhase::Complete, &mut events) {
                    self.completed_at = Some(Utc::now());
                    events.push(SessionEvent::SessionCompleted);
                }
            }
        }
        events
    }

    /// Apply a sequence of transitions, collecting every event.
    pub fn apply_all(&mut self, transitions: impl IntoIterator<Item = Transition>) -> Vec<SessionEvent> {
        transitions
            .into_iter()
            .flat_map(|t| self.apply(t))
            .collect()
    }

    fn set_phase(&mut self, target: SessionPhase, events: &mut Vec<SessionEvent>) -> bool {
        if !self.phase.can_transition_to(target) {
            return false;
        }
        self.phase = target;
        events.push(SessionEvent::PhaseChanged { phase: target });
        true
    }

    /// Move a topic's status, enforcing forward-only transitions, and
    /// recompute progress.
    fn set_status(&mut self, topic_id: &str, target: TopicStatus, events: &mut Vec<SessionEvent>) -> bool {
        let Some(topic) = self.topic_mut(topic_id) else {
            warn!(topic_id = %topic_id, "Status change for unknown topic ignored");
            return false;
        };
        if !topic.status.can_transition_to(target) {
            debug!(
                topic_id = %topic_id,
                from = %topic.status,
                to = %target,
                "Invalid status transition ignored"
            );
            return false;
        }
        topic.status = target;
        if target == TopicStatus::NotStarted {
            topic.phase = DialoguePhase::AwaitingInitial;
        }
        events.push(SessionEvent::TopicStatusChanged {
            topic_id: topic_id.to_string(),
            status: target,
        });
        self.progress = progress::calculate(&self.catalog, &self.topics);
        events.push(SessionEvent::ProgressUpdated {
            progress: self.progress.clone(),
        });
        true
    }

    fn topic_mut(&mut self, topic_id: &str) -> Option<&mut TopicState> {
        self.topics.iter_mut().find(|t| t.id == topic_id)
    }

    // ── Readers ─────────────────────────────────────────────────────

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn topics(&self) -> &[TopicState] {
        &self.topics
    }

    pub fn topic(&self, topic_id: &str) -> Option<&TopicState> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    /// The topic currently open for dialogue, if any.
    pub fn open_topic(&self) -> Option<&TopicState> {
        self.topics.iter().find(|t| t.status.is_open())
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// The selected topic's state.
    pub fn current_topic(&self) -> Option<&TopicState> {
        self.selection.as_ref().and_then(|s| self.topic(&s.topic_id))
    }

    pub fn is_review(&self) -> bool {
        self.selection.as_ref().is_some_and(|s| s.review)
    }

    /// Topic the assistant is currently composing a reply for.
    pub fn thinking(&self) -> Option<&str> {
        self.thinking.as_deref()
    }

    pub fn is_expanded(&self, group_id: &str) -> bool {
        self.expanded.contains(group_id)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn progress(&self) -> &SessionProgress {
        &self.progress
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            topics: self.topics.clone(),
            transcript: self.transcript.clone(),
            selection: self.selection.clone(),
            thinking: self.thinking.clone(),
            expanded_groups: self.expanded.iter().cloned().collect(),
            phase: self.phase,
            progress: self.progress.clone(),
            completed_at: self.completed_at,
        }
    }
}
