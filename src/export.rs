//! Knowledge handoff document.
//!
//! Renders what a session captured as Markdown, one section per group and
//! one subsection per topic, in catalog order.

use std::fmt::Write;

use crate::catalog::{Catalog, Topic};
use crate::session::{SessionSnapshot, TopicState};

/// How a topic appears in the handoff document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffStatus {
    Captured,
    /// Completed without any captured answer.
    Skipped,
    Pending,
}

impl HandoffStatus {
    pub fn of(state: Option<&TopicState>) -> Self {
        match state {
            Some(s) if s.status.is_completed() && s.has_capture() => Self::Captured,
            Some(s) if s.status.is_completed() => Self::Skipped,
            _ => Self::Pending,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Captured => "captured",
            Self::Skipped => "skipped",
            Self::Pending => "pending",
        }
    }
}

/// Render the handoff document for a session snapshot.
pub fn handoff_markdown(catalog: &Catalog, snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let progress = &snapshot.progress;

    let _ = writeln!(out, "# Knowledge handoff");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} of {} topics completed ({}%).",
        progress.completed_topics, progress.total_topics, progress.percent_complete
    );
    if let Some(at) = snapshot.completed_at {
        let _ = writeln!(out, "Session completed {}.", at.format("%Y-%m-%d %H:%M UTC"));
    }

    for group in catalog.groups() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## {}", group.title);
        if let Some(ref description) = group.description {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", description);
        }
        for topic in catalog.topics_in(&group.id) {
            write_topic(&mut out, topic, snapshot.topic(&topic.id));
        }
    }
    out
}

fn write_topic(out: &mut String, topic: &Topic, state: Option<&TopicState>) {
    let status = HandoffStatus::of(state);
    let _ = writeln!(out);
    let _ = writeln!(out, "### {} ({})", topic.title, status.label());
    let _ = writeln!(out);
    let _ = writeln!(out, "> {}", topic.question);

    let Some(state) = state else {
        return;
    };
    for answer in &state.captures {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", answer);
    }
}
