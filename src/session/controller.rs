//! Session controller: validates requests, drives the dialogue, and
//! sequences topics.
//!
//! A [`Session`] owns its store exclusively. Every public operation either
//! applies a series of store transitions or is rejected as a no-op; nothing
//! here returns an error. The two simulated delays ("assistant is thinking"
//! and "advancing to the next topic") run as spawned tokio tasks so callers
//! never block on them; [`Session::settle`] awaits all of them.
//!
//! Delayed effects:
//! - A reply is always delivered, tagged with the topic it was scheduled
//!   for, even if the participant has navigated elsewhere meanwhile.
//! - The automatic selection of the next topic is dropped if the selection
//!   changed during the delay.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::gating;
use super::model::{
    DialoguePhase, EntryKind, SessionEvent, SessionPhase, TopicState, TranscriptEntry,
    SKIP_MARKER,
};
use super::progress::SessionProgress;
use super::store::{SessionSnapshot, SessionStore, Transition};
use crate::catalog::{Catalog, Topic};
use crate::config::{Participant, SessionConfig};
use crate::dialogue::{Decision, DialogueResolver, DialogueTurn, Reply};
use crate::registry::SessionSummary;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// A request from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Begin,
    Select {
        topic_id: String,
        #[serde(default)]
        review: bool,
    },
    Submit {
        text: String,
    },
    Advance,
    Skip,
    ToggleGroup {
        group_id: String,
    },
}

/// Work scheduled to run after a delay.
#[derive(Debug, Clone)]
enum Effect {
    Reply {
        topic_id: String,
        content: String,
    },
    AutoSelect {
        topic_id: String,
        epoch: u64,
    },
}

struct Inner {
    id: Uuid,
    catalog: Arc<Catalog>,
    resolver: Arc<dyn DialogueResolver>,
    config: SessionConfig,
    store: RwLock<SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

/// One interview session over a catalog.
///
/// Lifecycle: [`Session::new`] → operations → [`Session::dispose`].
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(
        catalog: Arc<Catalog>,
        resolver: Arc<dyn DialogueResolver>,
        config: SessionConfig,
    ) -> Self {
        let (events, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let id = Uuid::new_v4();
        info!(
            session_id = %id,
            strategy = %resolver.strategy(),
            topics = catalog.topic_count(),
            "Session created"
        );
        Self {
            inner: Arc::new(Inner {
                id,
                store: RwLock::new(SessionStore::new(Arc::clone(&catalog))),
                catalog,
                resolver,
                config,
                events,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // ── Operations ──────────────────────────────────────────────────

    /// Leave the overview and show group selection.
    pub async fn begin(&self) -> bool {
        let mut store = self.inner.store.write().await;
        self.inner.commit(&mut store, Transition::Begin)
    }

    /// Select a topic, or a completed topic for read-only review.
    ///
    /// Rejected if the topic is unknown or not accessible, if review is
    /// requested for a topic that is not completed, or if another topic is
    /// open with captured content.
    pub async fn select(&self, topic_id: &str, review: bool) -> bool {
        let mut store = self.inner.store.write().await;
        self.inner.select_locked(&mut store, topic_id, review)
    }

    /// Submit a participant answer to the selected topic.
    pub async fn submit(&self, text: &str) -> bool {
        self.inner.submit(text).await
    }

    /// Complete the selected topic and move on.
    pub async fn advance(&self) -> bool {
        let mut store = self.inner.store.write().await;
        self.inner.advance_locked(&mut store).await
    }

    /// Record a skip marker, then advance.
    pub async fn skip(&self) -> bool {
        let mut store = self.inner.store.write().await;
        let Some(topic_id) = Inner::actionable_topic(&store) else {
            debug!("Skip rejected: no actionable topic");
            return false;
        };
        self.inner.commit(
            &mut store,
            Transition::Append(TranscriptEntry::user(EntryKind::Skip, &topic_id, SKIP_MARKER)),
        );
        info!(topic_id = %topic_id, "Topic skipped");
        self.inner.advance_locked(&mut store).await
    }

    /// Expand or collapse a group in the navigation. No gating effect.
    pub async fn toggle_group_expansion(&self, group_id: &str) -> bool {
        let mut store = self.inner.store.write().await;
        self.inner.commit(
            &mut store,
            Transition::ToggleGroup {
                group_id: group_id.to_string(),
            },
        )
    }

    /// Apply one command.
    pub async fn dispatch(&self, command: Command) -> bool {
        match command {
            Command::Begin => self.begin().await,
            Command::Select { topic_id, review } => self.select(&topic_id, review).await,
            Command::Submit { text } => self.submit(&text).await,
            Command::Advance => self.advance().await,
            Command::Skip => self.skip().await,
            Command::ToggleGroup { group_id } => self.toggle_group_expansion(&group_id).await,
        }
    }

    /// Apply commands in order, settling delayed effects after each one.
    /// Returns how many were accepted.
    pub async fn replay(&self, commands: impl IntoIterator<Item = Command>) -> usize {
        let mut accepted = 0;
        for command in commands {
            if self.dispatch(command).await {
                accepted += 1;
            }
            self.settle().await;
        }
        accepted
    }

    /// Wait until every scheduled delayed effect has run, including effects
    /// scheduled by those effects.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.pending.lock().await);
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Delayed session effect failed: {}", e);
                }
            }
        }
    }

    /// Number of delayed effects not yet run.
    pub async fn pending_effects(&self) -> usize {
        let pending = self.inner.pending.lock().await;
        pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// End the session, aborting any delayed effects that have not run.
    pub async fn dispose(self) {
        let handles = std::mem::take(&mut *self.inner.pending.lock().await);
        let aborted = handles.iter().filter(|h| !h.is_finished()).count();
        for handle in handles {
            handle.abort();
        }
        info!(session_id = %self.inner.id, aborted, "Session disposed");
    }

    // ── Readers ─────────────────────────────────────────────────────

    /// The selected topic's state.
    pub async fn current_topic(&self) -> Option<TopicState> {
        self.inner.store.read().await.current_topic().cloned()
    }

    pub async fn topic(&self, topic_id: &str) -> Option<TopicState> {
        self.inner.store.read().await.topic(topic_id).cloned()
    }

    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.inner.store.read().await.transcript().to_vec()
    }

    /// Transcript entries belonging to one group's topics.
    pub async fn group_transcript(&self, group_id: &str) -> Vec<TranscriptEntry> {
        let topics = self.inner.catalog.topics_in(group_id);
        let store = self.inner.store.read().await;
        store
            .transcript()
            .iter()
            .filter(|e| topics.iter().any(|t| t.id == e.topic_id))
            .cloned()
            .collect()
    }

    pub async fn progress(&self) -> SessionProgress {
        self.inner.store.read().await.progress().clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.store.read().await.phase()
    }

    pub async fn is_session_complete(&self) -> bool {
        self.inner.store.read().await.is_complete()
    }

    /// Whether the assistant is composing a reply for the selected topic.
    pub async fn is_thinking(&self) -> bool {
        let store = self.inner.store.read().await;
        match (store.thinking(), store.selection()) {
            (Some(thinking), Some(selection)) => thinking == selection.topic_id,
            _ => false,
        }
    }

    pub async fn is_review(&self) -> bool {
        self.inner.store.read().await.is_review()
    }

    pub async fn is_topic_accessible(&self, topic_id: &str) -> bool {
        let store = self.inner.store.read().await;
        gating::is_topic_accessible(topic_id, &self.inner.catalog, store.topics())
    }

    pub async fn is_group_accessible(&self, group_id: &str) -> bool {
        let store = self.inner.store.read().await;
        gating::is_group_accessible(group_id, &self.inner.catalog, store.topics())
    }

    pub async fn is_group_expanded(&self, group_id: &str) -> bool {
        self.inner.store.read().await.is_expanded(group_id)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.store.read().await.snapshot()
    }

    /// Summary for the registry, once the session is complete.
    pub async fn summary(&self, participant: &Participant) -> Option<SessionSummary> {
        let completed_at = self.inner.store.read().await.completed_at()?;
        Some(SessionSummary {
            session_id: self.inner.id,
            participant_name: participant.name.clone(),
            role_label: participant.role.clone(),
            project_label: participant.project.clone(),
            completed_at,
        })
    }
}

impl Inner {
    /// Apply a transition and broadcast its events. Returns whether anything
    /// observable changed.
    fn commit(&self, store: &mut SessionStore, transition: Transition) -> bool {
        let events = store.apply(transition);
        let changed = !events.is_empty();
        for event in events {
            // Ok if nobody is listening
            let _ = self.events.send(event);
        }
        changed
    }

    /// The selected topic, if it can take answers or be advanced: selected,
    /// not in review, and open.
    fn actionable_topic(store: &SessionStore) -> Option<String> {
        let selection = store.selection()?;
        if selection.review {
            return None;
        }
        let topic = store.topic(&selection.topic_id)?;
        topic.status.is_open().then(|| topic.id.clone())
    }

    fn select_locked(&self, store: &mut SessionStore, topic_id: &str, review: bool) -> bool {
        let Some(def) = self.catalog.topic(topic_id) else {
            debug!(topic_id = %topic_id, "Select rejected: unknown topic");
            return false;
        };
        if !gating::is_topic_accessible(topic_id, &self.catalog, store.topics()) {
            debug!(topic_id = %topic_id, "Select rejected: topic not accessible");
            return false;
        }
        let Some(state) = store.topic(topic_id).cloned() else {
            return false;
        };

        if review || state.status.is_completed() {
            if !state.status.is_completed() {
                debug!(topic_id = %topic_id, "Review rejected: topic not completed");
                return false;
            }
            self.commit(
                store,
                Transition::Select {
                    topic_id: topic_id.to_string(),
                    review: true,
                },
            );
            self.commit(
                store,
                Transition::ExpandGroup {
                    group_id: def.group_id.clone(),
                },
            );
            info!(topic_id = %topic_id, "Topic opened for review");
            return true;
        }

        if let Some(open) = store.open_topic().cloned() {
            if open.id != topic_id {
                if open.has_capture() {
                    debug!(
                        topic_id = %topic_id,
                        open = %open.id,
                        "Select rejected: open topic has captured content"
                    );
                    return false;
                }
                self.commit(store, Transition::RevertTopic { topic_id: open.id.clone() });
                debug!(topic_id = %open.id, "Open topic reverted to not started");
            }
        }

        self.commit(
            store,
            Transition::Select {
                topic_id: topic_id.to_string(),
                review: false,
            },
        );
        if !state.status.is_open() {
            self.commit(
                store,
                Transition::OpenTopic {
                    topic_id: topic_id.to_string(),
                    status: self.resolver.open_status(),
                },
            );
        }
        self.commit(
            store,
            Transition::ExpandGroup {
                group_id: def.group_id.clone(),
            },
        );
        if !state.question_asked {
            self.commit(
                store,
                Transition::Append(TranscriptEntry::assistant(
                    EntryKind::Question,
                    topic_id,
                    &def.question,
                )),
            );
            self.commit(store, Transition::MarkQuestionAsked { topic_id: topic_id.to_string() });
        }
        info!(topic_id = %topic_id, group_id = %def.group_id, "Topic selected");
        true
    }

    async fn submit(self: &Arc<Self>, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            debug!("Submit rejected: empty input");
            return false;
        }
        let mut store = self.store.write().await;
        let Some(topic_id) = Self::actionable_topic(&store) else {
            debug!("Submit rejected: no actionable topic");
            return false;
        };
        if store.thinking() == Some(topic_id.as_str()) {
            debug!(topic_id = %topic_id, "Submit rejected: reply pending");
            return false;
        }
        let Some(state) = store.topic(&topic_id).cloned() else {
            return false;
        };
        if state.phase == DialoguePhase::Wrapped {
            debug!(topic_id = %topic_id, "Submit rejected: dialogue wrapped, waiting for continue");
            return false;
        }
        let Some(def) = self.catalog.topic(&topic_id) else {
            return false;
        };

        let is_follow_up = state.phase == DialoguePhase::AwaitingFollowUp;
        self.commit(
            &mut store,
            Transition::Append(
                TranscriptEntry::user(EntryKind::Answer, &topic_id, text).with_follow_up(is_follow_up),
            ),
        );

        let decision = self.resolver.resolve(&DialogueTurn {
            topic: def,
            phase: state.phase,
            input: text,
            follow_ups_asked: state.follow_ups_asked,
        });
        debug!(topic_id = %topic_id, phase = %state.phase, ?decision, "Answer resolved");

        let capture = Transition::Capture {
            topic_id: topic_id.clone(),
            text: text.to_string(),
        };
        match decision {
            Decision::FollowUp(reply) => {
                self.commit(&mut store, capture);
                self.commit(
                    &mut store,
                    Transition::SetDialoguePhase {
                        topic_id: topic_id.clone(),
                        phase: DialoguePhase::AwaitingFollowUp,
                    },
                );
                self.commit(&mut store, Transition::RecordFollowUpAsked { topic_id: topic_id.clone() });
                let content = self.follow_up_text(def, reply);
                self.schedule_reply(&mut store, topic_id, content).await;
            }
            Decision::Wrap(reply) => {
                self.commit(&mut store, capture);
                self.commit(
                    &mut store,
                    Transition::SetDialoguePhase {
                        topic_id: topic_id.clone(),
                        phase: DialoguePhase::Wrapped,
                    },
                );
                let content = match reply {
                    Reply::Text(text) => text,
                    Reply::Fallback => self.config.acknowledgement.clone(),
                };
                self.schedule_reply(&mut store, topic_id, content).await;
            }
            Decision::Complete => {
                self.commit(&mut store, capture);
                info!(topic_id = %topic_id, "Answer completes topic");
                self.advance_locked(&mut store).await;
            }
            Decision::MoveOn => {
                info!(topic_id = %topic_id, "Participant moved on without capture");
                self.advance_locked(&mut store).await;
            }
        }
        true
    }

    /// Follow-up text: scripted reply, else the topic's static follow-up,
    /// else the generic fallback.
    fn follow_up_text(&self, def: &Topic, reply: Reply) -> String {
        match reply {
            Reply::Text(text) => text,
            Reply::Fallback => def
                .follow_up_question
                .clone()
                .unwrap_or_else(|| self.config.fallback_follow_up.clone()),
        }
    }

    async fn schedule_reply(self: &Arc<Self>, store: &mut SessionStore, topic_id: String, content: String) {
        self.commit(
            store,
            Transition::SetThinking {
                topic_id: Some(topic_id.clone()),
            },
        );
        self.schedule(self.config.thinking_delay, Effect::Reply { topic_id, content })
            .await;
    }

    /// Complete the selected topic, then either finish the session or
    /// schedule the next topic.
    async fn advance_locked(self: &Arc<Self>, store: &mut SessionStore) -> bool {
        let Some(topic_id) = Self::actionable_topic(store) else {
            debug!("Advance rejected: no actionable topic");
            return false;
        };
        let Some(def) = self.catalog.topic(&topic_id) else {
            return false;
        };

        self.commit(store, Transition::CompleteTopic { topic_id: topic_id.clone() });
        let progress = store.progress();
        info!(
            topic_id = %topic_id,
            completed = progress.completed_topics,
            total = progress.total_topics,
            "Topic completed"
        );

        if gating::is_catalog_complete(&self.catalog, store.topics()) {
            self.commit(
                store,
                Transition::Append(TranscriptEntry::assistant(
                    EntryKind::Completion,
                    &topic_id,
                    &self.config.completion_message,
                )),
            );
            // Finish first: the terminal phase absorbs the selection clear.
            self.commit(store, Transition::Finish);
            self.commit(store, Transition::ClearSelection);
            info!(session_id = %self.id, "Session complete");
            return true;
        }

        self.commit(store, Transition::ClearSelection);
        let Some(next) = gating::next_topic(&self.catalog, store.topics()) else {
            warn!(topic_id = %topic_id, "No next topic available after completion");
            return true;
        };

        let content = self.transition_text(def, next);
        self.commit(
            store,
            Transition::Append(TranscriptEntry::assistant(
                EntryKind::Transition,
                &topic_id,
                content,
            )),
        );
        let epoch = store.epoch();
        debug!(next = %next.id, epoch, "Next topic scheduled");
        self.schedule(
            self.config.advance_delay,
            Effect::AutoSelect {
                topic_id: next.id.clone(),
                epoch,
            },
        )
        .await;
        true
    }

    fn transition_text(&self, completed: &Topic, next: &Topic) -> String {
        if completed.group_id == next.group_id {
            return self.config.topic_transition.replace("{topic}", &next.title);
        }
        let title = |topic: &Topic| {
            self.catalog
                .group_of(&topic.id)
                .map(|g| g.title.clone())
                .unwrap_or_else(|| topic.group_id.clone())
        };
        self.config
            .group_transition
            .replace("{group}", &title(completed))
            .replace("{next_group}", &title(next))
            .replace("{topic}", &next.title)
    }

    async fn schedule(self: &Arc<Self>, delay: Duration, effect: Effect) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            inner.fire(effect).await;
        });
        let mut pending = self.pending.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    async fn fire(&self, effect: Effect) {
        let mut store = self.store.write().await;
        match effect {
            Effect::Reply { topic_id, content } => {
                let selected = store.selection().map(|s| s.topic_id.clone());
                if selected.as_deref() != Some(topic_id.as_str()) {
                    info!(
                        topic_id = %topic_id,
                        selected = ?selected,
                        "Reply delivered to a topic that is no longer selected"
                    );
                }
                self.commit(
                    &mut store,
                    Transition::Append(
                        TranscriptEntry::assistant(EntryKind::Reply, &topic_id, content)
                            .with_follow_up(true),
                    ),
                );
                if store.thinking() == Some(topic_id.as_str()) {
                    self.commit(&mut store, Transition::SetThinking { topic_id: None });
                }
            }
            Effect::AutoSelect { topic_id, epoch } => {
                if store.epoch() != epoch {
                    debug!(topic_id = %topic_id, "Auto-select superseded by a newer selection");
                    return;
                }
                self.select_locked(&mut store, &topic_id, false);
            }
        }
    }
}
