//! End-to-end tests for the session controller.
//!
//! Every test runs on a paused tokio clock: the thinking and advancing
//! delays are real `sleep`s, but virtual time auto-advances while the test
//! awaits `settle()`, so nothing depends on wall-clock timing.

use std::sync::Arc;

use elicit::catalog::{Catalog, GroupSpec, ScriptedResponses, TopicSpec};
use elicit::config::{Participant, SessionConfig};
use elicit::dialogue::{DialogueResolver, HeuristicResolver, ScriptedResolver};
use elicit::export::handoff_markdown;
use elicit::session::{
    Command, DialoguePhase, EntryKind, Role, Session, SessionEvent, SessionPhase, TopicStatus,
    SKIP_MARKER,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn topic(id: &str) -> TopicSpec {
    TopicSpec {
        id: id.to_string(),
        title: format!("Topic {id}"),
        question: format!("Question for {id}?"),
        follow_up_question: Some(format!("Follow-up for {id}?")),
        responses: ScriptedResponses::default(),
        preview: None,
    }
}

fn catalog(groups: &[(&str, &[&str])]) -> Arc<Catalog> {
    let specs = groups
        .iter()
        .map(|(id, topics)| GroupSpec {
            id: id.to_string(),
            title: format!("Group {id}"),
            description: None,
            topics: topics.iter().map(|t| topic(t)).collect(),
        })
        .collect();
    Arc::new(Catalog::new(specs).expect("valid catalog"))
}

fn scripted(catalog: Arc<Catalog>) -> Session {
    let resolver: Arc<dyn DialogueResolver> = Arc::new(ScriptedResolver::from_catalog(&catalog));
    Session::new(catalog, resolver, SessionConfig::default())
}

fn heuristic(catalog: Arc<Catalog>) -> Session {
    Session::new(
        catalog,
        Arc::new(HeuristicResolver::default()),
        SessionConfig::default(),
    )
}

async fn status(session: &Session, id: &str) -> TopicStatus {
    session.topic(id).await.expect("known topic").status
}

async fn open_count(session: &Session) -> usize {
    session
        .snapshot()
        .await
        .topics
        .iter()
        .filter(|t| t.status.is_open())
        .count()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scenario_a_select_submit_advance() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"])]));

    assert!(session.select("t1", false).await);
    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].kind, EntryKind::Question);
    assert_eq!(transcript[0].content, "Question for t1?");

    assert!(session.submit("answer").await);
    assert_eq!(session.transcript().await.len(), 2);
    session.settle().await;
    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[2].role, Role::Assistant);
    // Lookup miss falls back to the topic's static follow-up.
    assert_eq!(transcript[2].content, "Follow-up for t1?");

    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.status, TopicStatus::Active);
    assert_eq!(t1.phase, DialoguePhase::AwaitingFollowUp);
    assert_eq!(t1.captured_response.as_deref(), Some("answer"));

    assert!(session.advance().await);
    assert_eq!(status(&session, "t1").await, TopicStatus::Completed);
    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[3].kind, EntryKind::Transition);
    assert!(transcript[3].content.contains("Topic t2"));

    session.settle().await;
    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 5);
    assert_eq!(transcript[4].kind, EntryKind::Question);
    assert_eq!(transcript[4].topic_id, "t2");
    assert_eq!(session.current_topic().await.unwrap().id, "t2");
    assert_eq!(status(&session, "t2").await, TopicStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_advance_without_selection_is_noop() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"])]));
    let before = session.snapshot().await;

    assert!(!session.advance().await);
    assert!(!session.skip().await);
    assert!(!session.submit("hello").await);
    session.settle().await;

    let after = session.snapshot().await;
    assert_eq!(before.transcript, after.transcript);
    assert_eq!(before.topics, after.topics);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_next_group_unlocks_on_completion() {
    let session = scripted(catalog(&[("g1", &["t1"]), ("g2", &["t2"])]));

    assert!(!session.is_topic_accessible("t2").await);
    assert!(!session.is_group_accessible("g2").await);
    assert!(!session.select("t2", false).await);

    session.select("t1", false).await;
    assert!(session.advance().await);
    assert!(session.is_topic_accessible("t2").await);
    assert!(session.is_group_accessible("g2").await);

    session.settle().await;
    assert_eq!(session.current_topic().await.unwrap().id, "t2");
    let transcript = session.transcript().await;
    let interstitial = transcript
        .iter()
        .find(|e| e.kind == EntryKind::Transition)
        .unwrap();
    assert!(interstitial.content.contains("Group g1"));
    assert!(interstitial.content.contains("Group g2"));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_heuristic_done_completes_first_turn() {
    let session = heuristic(catalog(&[("g1", &["t1", "t2"])]));

    session.select("t1", false).await;
    assert_eq!(status(&session, "t1").await, TopicStatus::InProgress);
    assert!(session.submit("We check it monthly, I'm done").await);

    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.status, TopicStatus::Completed);
    assert_eq!(
        t1.captured_response.as_deref(),
        Some("We check it monthly, I'm done")
    );
    assert!(
        !session
            .transcript()
            .await
            .iter()
            .any(|e| e.kind == EntryKind::Reply)
    );

    session.settle().await;
    assert_eq!(session.current_topic().await.unwrap().id, "t2");
}

// ── Dialogue ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scripted_two_turn_dialogue_wraps() {
    let mut g1 = GroupSpec {
        id: "g1".into(),
        title: "Group g1".into(),
        description: None,
        topics: vec![topic("t1"), topic("t2")],
    };
    g1.topics[0].responses.initial = Some("Scripted nudge".into());
    let catalog = Arc::new(Catalog::new(vec![g1]).unwrap());
    let session = scripted(catalog);

    session.select("t1", false).await;
    session.submit("first").await;
    session.settle().await;
    session.submit("second").await;
    session.settle().await;

    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.phase, DialoguePhase::Wrapped);
    assert_eq!(t1.captured_response.as_deref(), Some("first"));
    assert_eq!(t1.captured_follow_up_response.as_deref(), Some("second"));

    let replies: Vec<String> = session
        .transcript()
        .await
        .into_iter()
        .filter(|e| e.kind == EntryKind::Reply)
        .map(|e| e.content)
        .collect();
    assert_eq!(replies[0], "Scripted nudge");
    assert_eq!(replies[1], SessionConfig::default().acknowledgement);

    let answers: Vec<bool> = session
        .transcript()
        .await
        .into_iter()
        .filter(|e| e.kind == EntryKind::Answer)
        .map(|e| e.is_follow_up)
        .collect();
    assert_eq!(answers, vec![false, true]);

    // Wrapped topics wait for continue.
    let len = session.transcript().await.len();
    assert!(!session.submit("third").await);
    assert_eq!(session.transcript().await.len(), len);
    assert!(session.advance().await);
    assert_eq!(status(&session, "t1").await, TopicStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn submit_is_gated_while_reply_pending() {
    let session = scripted(catalog(&[("g1", &["t1"])]));
    session.select("t1", false).await;

    assert!(session.submit("first").await);
    assert!(session.is_thinking().await);
    assert!(!session.submit("too fast").await);
    assert_eq!(session.transcript().await.len(), 2);

    session.settle().await;
    assert!(!session.is_thinking().await);
    assert!(session.submit("second").await);
}

#[tokio::test(start_paused = true)]
async fn empty_submission_is_rejected() {
    let session = scripted(catalog(&[("g1", &["t1"])]));
    session.select("t1", false).await;
    assert!(!session.submit("   \n\t").await);
    assert_eq!(session.transcript().await.len(), 1);
    assert!(session.topic("t1").await.unwrap().captured_response.is_none());
}

#[tokio::test(start_paused = true)]
async fn heuristic_threshold_forces_capture() {
    let session = heuristic(catalog(&[("g1", &["t1", "t2"])]));
    session.select("t1", false).await;

    session.submit("We watch the unemployment series").await;
    session.settle().await;
    session.submit("Mostly after a macro shock").await;
    session.settle().await;
    assert_eq!(session.topic("t1").await.unwrap().follow_ups_asked, 2);
    assert_eq!(status(&session, "t1").await, TopicStatus::InProgress);

    // Keywords no longer matter once the threshold is reached.
    session.submit("next, I guess").await;
    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.status, TopicStatus::Completed);
    assert_eq!(
        t1.captured_response.as_deref(),
        Some("We watch the unemployment series")
    );
    assert_eq!(t1.captured_follow_up_response.as_deref(), Some("next, I guess"));

    let replies: Vec<String> = session
        .transcript()
        .await
        .into_iter()
        .filter(|e| e.kind == EntryKind::Reply)
        .map(|e| e.content)
        .collect();
    assert_eq!(replies.len(), 2);
    assert!(replies[0].contains("We watch the unemployment series"));
}

#[tokio::test(start_paused = true)]
async fn heuristic_move_on_completes_without_capture() {
    let session = heuristic(catalog(&[("g1", &["t1", "t2"])]));
    session.select("t1", false).await;
    assert!(session.submit("Let's move on").await);

    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.status, TopicStatus::Completed);
    assert!(!t1.has_capture());
}

#[tokio::test(start_paused = true)]
async fn heuristic_done_on_follow_up_captures_both_answers() {
    let session = heuristic(catalog(&[("g1", &["t1"])]));
    session.select("t1", false).await;
    session.submit("We watch unemployment").await;
    session.settle().await;
    assert_eq!(status(&session, "t1").await, TopicStatus::InProgress);

    assert!(session.submit("done for now").await);
    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.status, TopicStatus::Completed);
    assert_eq!(t1.captured_response.as_deref(), Some("We watch unemployment"));
    assert_eq!(t1.captured_follow_up_response.as_deref(), Some("done for now"));
    assert_eq!(t1.captures.len(), 2);
    assert!(session.is_session_complete().await);
}

#[tokio::test(start_paused = true)]
async fn heuristic_move_on_after_follow_up_keeps_first_answer() {
    let session = heuristic(catalog(&[("g1", &["t1"])]));
    session.select("t1", false).await;
    session.submit("We watch unemployment").await;
    session.settle().await;

    assert!(session.submit("move on").await);
    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.status, TopicStatus::Completed);
    assert_eq!(t1.captured_response.as_deref(), Some("We watch unemployment"));
    assert!(t1.captured_follow_up_response.is_none());
    assert!(session.is_session_complete().await);
}

#[tokio::test(start_paused = true)]
async fn handoff_keeps_every_heuristic_answer() {
    let session = heuristic(catalog(&[("g1", &["t1"])]));
    session.select("t1", false).await;
    let answers = [
        "We watch unemployment",
        "Mostly after a macro shock",
        "Recalibrated in March",
    ];
    for answer in answers {
        session.submit(answer).await;
        session.settle().await;
    }
    assert_eq!(status(&session, "t1").await, TopicStatus::Completed);

    let doc = handoff_markdown(session.catalog(), &session.snapshot().await);
    let positions: Vec<usize> = answers
        .iter()
        .map(|a| doc.find(a).expect("answer in handoff"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

// ── Navigation ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reselect_reverts_uncaptured_topic() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"])]));

    session.select("t1", false).await;
    assert!(session.select("t2", false).await);
    assert_eq!(status(&session, "t1").await, TopicStatus::NotStarted);
    assert_eq!(status(&session, "t2").await, TopicStatus::Active);
    assert_eq!(open_count(&session).await, 1);

    // Opening question is not repeated on return.
    assert!(session.select("t1", false).await);
    assert_eq!(session.transcript().await.len(), 2);
    assert_eq!(status(&session, "t2").await, TopicStatus::NotStarted);
}

#[tokio::test(start_paused = true)]
async fn captured_topic_cannot_be_abandoned() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"])]));
    session.select("t1", false).await;
    session.submit("something").await;
    session.settle().await;

    assert!(!session.select("t2", false).await);
    assert_eq!(session.current_topic().await.unwrap().id, "t1");
    assert_eq!(status(&session, "t2").await, TopicStatus::NotStarted);
}

#[tokio::test(start_paused = true)]
async fn single_open_topic_throughout() {
    let session = scripted(catalog(&[("g1", &["t1", "t2", "t3"]), ("g2", &["t4"])]));
    let commands = [
        Command::Select { topic_id: "t2".into(), review: false },
        Command::Select { topic_id: "t1".into(), review: false },
        Command::Submit { text: "a".into() },
        Command::Select { topic_id: "t3".into(), review: false },
        Command::Advance,
        Command::Select { topic_id: "t3".into(), review: false },
        Command::Skip,
        Command::Select { topic_id: "t4".into(), review: false },
        Command::Skip,
    ];
    for command in commands {
        session.dispatch(command).await;
        assert!(open_count(&session).await <= 1);
        session.settle().await;
        assert!(open_count(&session).await <= 1);
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_and_locked_selects_are_noops() {
    let session = scripted(catalog(&[("g1", &["t1"]), ("g2", &["t2"])]));
    let before = session.snapshot().await;

    assert!(!session.select("nope", false).await);
    assert!(!session.select("t2", false).await);
    assert!(!session.select("t1", true).await);

    let after = session.snapshot().await;
    assert_eq!(before.transcript, after.transcript);
    assert_eq!(before.topics, after.topics);
    assert_eq!(before.selection, after.selection);
}

#[tokio::test(start_paused = true)]
async fn review_is_read_only() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"])]));
    session.select("t1", false).await;
    session.submit("kept").await;
    session.settle().await;
    session.advance().await;
    session.settle().await;

    let len = session.transcript().await.len();
    assert!(session.select("t1", true).await);
    assert!(session.is_review().await);
    assert_eq!(session.phase().await, SessionPhase::Review);
    assert_eq!(session.transcript().await.len(), len);

    assert!(!session.submit("edit").await);
    assert!(!session.advance().await);
    assert!(!session.skip().await);
    session.settle().await;

    let t1 = session.topic("t1").await.unwrap();
    assert_eq!(t1.status, TopicStatus::Completed);
    assert_eq!(t1.captured_response.as_deref(), Some("kept"));
    assert_eq!(session.transcript().await.len(), len);
    // The open topic is untouched by reviewing another.
    assert_eq!(status(&session, "t2").await, TopicStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn selecting_completed_topic_enters_review() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"])]));
    session.select("t1", false).await;
    session.skip().await;
    session.settle().await;

    assert!(session.select("t1", false).await);
    assert!(session.is_review().await);
    assert_eq!(status(&session, "t1").await, TopicStatus::Completed);
}

// ── Delayed effects ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn late_reply_lands_on_its_own_topic() {
    let session = scripted(catalog(&[("g1", &["t1", "t2", "t3"])]));
    session.select("t1", false).await;
    session.skip().await;
    session.settle().await;
    assert_eq!(session.current_topic().await.unwrap().id, "t2");

    session.submit("answer for t2").await;
    assert!(session.is_thinking().await);

    // Navigate away while the reply is pending.
    assert!(session.select("t1", true).await);
    assert!(!session.is_thinking().await);

    // Coming back before it lands: input still gated.
    assert!(session.select("t2", false).await);
    assert!(!session.submit("again").await);

    session.settle().await;
    let transcript = session.transcript().await;
    let reply = transcript.last().unwrap();
    assert_eq!(reply.kind, EntryKind::Reply);
    assert_eq!(reply.topic_id, "t2");
    assert!(session.snapshot().await.thinking.is_none());
    assert!(session.submit("again").await);
}

#[tokio::test(start_paused = true)]
async fn late_reply_is_delivered_during_review() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"])]));
    session.select("t1", false).await;
    session.skip().await;
    session.settle().await;
    session.submit("answer for t2").await;
    session.select("t1", true).await;
    session.settle().await;

    // Selection stays where the participant put it.
    let selection = session.snapshot().await.selection.unwrap();
    assert_eq!(selection.topic_id, "t1");
    assert!(selection.review);
    let replies_for_t2 = session
        .group_transcript("g1")
        .await
        .into_iter()
        .filter(|e| e.kind == EntryKind::Reply && e.topic_id == "t2")
        .count();
    assert_eq!(replies_for_t2, 1);
}

#[tokio::test(start_paused = true)]
async fn manual_select_supersedes_auto_select() {
    let session = scripted(catalog(&[("g1", &["t1", "t2", "t3"])]));
    session.select("t1", false).await;
    session.advance().await;
    assert!(session.current_topic().await.is_none());
    assert_eq!(session.phase().await, SessionPhase::GroupSelection);

    assert!(session.select("t3", false).await);
    session.settle().await;

    assert_eq!(session.current_topic().await.unwrap().id, "t3");
    assert_eq!(status(&session, "t2").await, TopicStatus::NotStarted);
    assert!(
        !session
            .transcript()
            .await
            .iter()
            .any(|e| e.kind == EntryKind::Question && e.topic_id == "t2")
    );
}

#[tokio::test(start_paused = true)]
async fn next_topic_stays_in_current_group() {
    let session = scripted(catalog(&[("g1", &["t1", "t2", "t3"]), ("g2", &["t4"])]));
    session.select("t2", false).await;
    session.skip().await;
    session.settle().await;
    assert_eq!(session.current_topic().await.unwrap().id, "t1");
    session.skip().await;
    session.settle().await;
    assert_eq!(session.current_topic().await.unwrap().id, "t3");
    assert!(!session.is_group_accessible("g2").await);
}

// ── Completion ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn skip_records_marker_and_completes_session() {
    let session = scripted(catalog(&[("g1", &["t1"])]));
    let mut events = session.subscribe();
    assert!(session.begin().await);
    session.select("t1", false).await;
    assert!(session.skip().await);

    let transcript = session.transcript().await;
    let skip = &transcript[1];
    assert_eq!(skip.role, Role::User);
    assert_eq!(skip.kind, EntryKind::Skip);
    assert_eq!(skip.content, SKIP_MARKER);
    assert_eq!(transcript.last().unwrap().kind, EntryKind::Completion);

    assert!(session.is_session_complete().await);
    assert!(session.current_topic().await.is_none());
    assert_eq!(session.phase().await, SessionPhase::Complete);
    assert_eq!(session.progress().await.percent_complete, 100);
    assert!(!session.topic("t1").await.unwrap().has_capture());

    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        completed |= matches!(event, SessionEvent::SessionCompleted);
    }
    assert!(completed);

    // Terminal: nothing more is accepted except review.
    assert!(!session.skip().await);
    assert!(session.select("t1", true).await);
    assert_eq!(session.phase().await, SessionPhase::Complete);
}

#[tokio::test(start_paused = true)]
async fn completion_does_not_flash_group_selection() {
    let session = scripted(catalog(&[("g1", &["t1"])]));
    session.select("t1", false).await;
    let mut events = session.subscribe();
    assert!(session.skip().await);

    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::PhaseChanged { phase } = event {
            phases.push(phase);
        }
    }
    assert_eq!(phases, vec![SessionPhase::Complete]);
}

#[tokio::test(start_paused = true)]
async fn summary_only_after_completion() {
    let session = scripted(catalog(&[("g1", &["t1"])]));
    let participant = Participant {
        name: "Dana".into(),
        role: "Model owner".into(),
        project: "loss-forecast".into(),
    };
    assert!(session.summary(&participant).await.is_none());

    session.select("t1", false).await;
    session.advance().await;
    let summary = session.summary(&participant).await.unwrap();
    assert_eq!(summary.session_id, session.id());
    assert_eq!(summary.participant_name, "Dana");
    assert_eq!(summary.project_label, "loss-forecast");
}

#[tokio::test(start_paused = true)]
async fn progress_tracks_completed_topics() {
    let session = scripted(catalog(&[("g1", &["t1", "t2"]), ("g2", &["t3"])]));
    session.select("t1", false).await;
    session.skip().await;

    let progress = session.progress().await;
    assert_eq!(progress.completed_topics, 1);
    assert_eq!(progress.total_topics, 3);
    assert_eq!(progress.percent_complete, 33);
    assert_eq!(progress.group("g1").unwrap().percent_complete, 50);
    assert_eq!(progress.group("g2").unwrap().percent_complete, 0);
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn replay_reaches_same_state_as_interactive_use() {
    let commands: Vec<Command> = serde_json::from_str(
        r#"[
            {"action": "begin"},
            {"action": "select", "topic_id": "t1"},
            {"action": "submit", "text": "first"},
            {"action": "submit", "text": "second"},
            {"action": "advance"},
            {"action": "submit", "text": "only"},
            {"action": "skip"},
            {"action": "toggle_group", "group_id": "g2"}
        ]"#,
    )
    .unwrap();

    let replayed = scripted(catalog(&[("g1", &["t1", "t2"]), ("g2", &["t3"])]));
    let accepted = replayed.replay(commands).await;
    assert_eq!(accepted, 8);

    let manual = scripted(catalog(&[("g1", &["t1", "t2"]), ("g2", &["t3"])]));
    manual.begin().await;
    manual.select("t1", false).await;
    manual.submit("first").await;
    manual.settle().await;
    manual.submit("second").await;
    manual.settle().await;
    manual.advance().await;
    manual.settle().await;
    manual.submit("only").await;
    manual.settle().await;
    manual.skip().await;
    manual.settle().await;
    manual.toggle_group_expansion("g2").await;

    let a = replayed.snapshot().await;
    let b = manual.snapshot().await;
    assert_eq!(a.topics, b.topics);
    assert_eq!(a.progress, b.progress);
    assert_eq!(a.selection, b.selection);
    assert_eq!(a.expanded_groups, b.expanded_groups);
    let contents = |s: &elicit::session::SessionSnapshot| {
        s.transcript.iter().map(|e| e.content.clone()).collect::<Vec<_>>()
    };
    assert_eq!(contents(&a), contents(&b));
    assert_eq!(a.selection.unwrap().topic_id, "t3");
}

#[tokio::test(start_paused = true)]
async fn toggle_group_has_no_gating_effect() {
    let session = scripted(catalog(&[("g1", &["t1"]), ("g2", &["t2"])]));
    assert!(session.is_group_expanded("g1").await);
    assert!(session.toggle_group_expansion("g2").await);
    assert!(session.is_group_expanded("g2").await);
    assert!(!session.is_group_accessible("g2").await);
    assert!(session.toggle_group_expansion("g1").await);
    assert!(!session.is_group_expanded("g1").await);
    assert!(!session.toggle_group_expansion("missing").await);
}
