//! Session data model: topic runtime state, transcript entries, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::progress::SessionProgress;

/// Externally visible status of a topic.
///
/// `Active` is used by the scripted strategy and `InProgress` by the
/// heuristic one; both mean "the topic currently open for dialogue".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    NotStarted,
    Active,
    InProgress,
    Completed,
}

impl TopicStatus {
    /// Whether the topic is open for dialogue.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::InProgress)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Status only moves forward, except that an open topic may revert to
    /// `NotStarted` (the caller checks that nothing was captured).
    pub fn can_transition_to(&self, target: TopicStatus) -> bool {
        use TopicStatus::*;
        matches!(
            (self, target),
            (NotStarted, Active)
                | (NotStarted, InProgress)
                | (Active, Completed)
                | (InProgress, Completed)
                | (Active, NotStarted)
                | (InProgress, NotStarted)
        )
    }
}

impl Default for TopicStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl std::fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Dialogue sub-step within an open topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialoguePhase {
    /// Opening question asked, no answer yet.
    AwaitingInitial,
    /// First answer captured, follow-up asked.
    AwaitingFollowUp,
    /// Follow-up answered; waiting for an explicit continue.
    Wrapped,
    /// Topic completed.
    Closed,
}

impl Default for DialoguePhase {
    fn default() -> Self {
        Self::AwaitingInitial
    }
}

impl std::fmt::Display for DialoguePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingInitial => "awaiting_initial",
            Self::AwaitingFollowUp => "awaiting_follow_up",
            Self::Wrapped => "wrapped",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Runtime state of one topic within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicState {
    pub id: String,
    pub group_id: String,
    pub status: TopicStatus,
    pub phase: DialoguePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_response: Option<String>,
    /// Latest captured follow-up answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_follow_up_response: Option<String>,
    /// Every captured answer, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<String>,
    /// Follow-up questions asked so far on this topic.
    pub follow_ups_asked: u32,
    /// Whether the opening question is already in the transcript.
    pub question_asked: bool,
}

impl TopicState {
    pub fn new(id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            status: TopicStatus::NotStarted,
            phase: DialoguePhase::AwaitingInitial,
            captured_response: None,
            captured_follow_up_response: None,
            captures: Vec::new(),
            follow_ups_asked: 0,
            question_asked: false,
        }
    }

    /// Whether any answer has been captured.
    pub fn has_capture(&self) -> bool {
        self.captured_response.is_some() || self.captured_follow_up_response.is_some()
    }
}

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
    User,
}

/// What a transcript entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Opening question of a topic.
    Question,
    /// Participant answer.
    Answer,
    /// Assistant follow-up or acknowledgement.
    Reply,
    /// Literal skip marker.
    Skip,
    /// Interstitial between topics or groups.
    Transition,
    /// Session completion notice.
    Completion,
}

/// Literal content recorded when a topic is skipped.
pub const SKIP_MARKER: &str = "[Skipped]";

/// One entry of the append-only transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub role: Role,
    pub kind: EntryKind,
    pub content: String,
    pub topic_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_follow_up: bool,
}

impl TranscriptEntry {
    pub fn new(role: Role, kind: EntryKind, topic_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            kind,
            content: content.into(),
            topic_id: topic_id.into(),
            timestamp: Utc::now(),
            is_follow_up: false,
        }
    }

    pub fn assistant(kind: EntryKind, topic_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, kind, topic_id, content)
    }

    pub fn user(kind: EntryKind, topic_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::User, kind, topic_id, content)
    }

    /// Builder: mark as part of the follow-up exchange.
    pub fn with_follow_up(mut self, is_follow_up: bool) -> Self {
        self.is_follow_up = is_follow_up;
        self
    }
}

/// Coarse session-level marker deciding which surface the UI shows.
///
/// Progresses Overview → GroupSelection → Dialogue ⇄ Review → Complete.
/// It never gates data access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Overview,
    GroupSelection,
    Dialogue,
    Review,
    Complete,
}

impl SessionPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        *self != target && !self.is_terminal() && target != SessionPhase::Overview
    }

    /// Whether this phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::Overview
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Overview => "overview",
            Self::GroupSelection => "group_selection",
            Self::Dialogue => "dialogue",
            Self::Review => "review",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// The topic currently shown to the participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub topic_id: String,
    /// Read-only review of a completed topic.
    pub review: bool,
}

/// Change notifications fanned out to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    EntryAppended { entry: TranscriptEntry },
    TopicStatusChanged { topic_id: String, status: TopicStatus },
    ProgressUpdated { progress: SessionProgress },
    SelectionChanged { selection: Option<Selection> },
    ThinkingChanged { topic_id: Option<String> },
    PhaseChanged { phase: SessionPhase },
    GroupToggled { group_id: String, expanded: bool },
    SessionCompleted,
}
