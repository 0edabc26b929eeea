//! Progress calculator: completion counts derived from topic statuses.

use serde::{Deserialize, Serialize};

use super::model::TopicState;
use crate::catalog::Catalog;

/// Completion figures for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProgress {
    pub group_id: String,
    pub total: usize,
    pub completed: usize,
    pub percent_complete: u8,
}

impl GroupProgress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Completion figures for the whole session. Always derived, never edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub total_topics: usize,
    pub completed_topics: usize,
    pub percent_complete: u8,
    /// Per-group figures in catalog order.
    pub per_group: Vec<GroupProgress>,
}

impl SessionProgress {
    /// Figures for one group.
    pub fn group(&self, group_id: &str) -> Option<&GroupProgress> {
        self.per_group.iter().find(|g| g.group_id == group_id)
    }

    pub fn is_complete(&self) -> bool {
        self.total_topics > 0 && self.completed_topics == self.total_topics
    }
}

/// Rounded percentage; zero when there is nothing to complete.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (completed as f64 * 100.0 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

fn count_completed<'a>(topics: impl Iterator<Item = &'a TopicState>) -> usize {
    topics.filter(|t| t.status.is_completed()).count()
}

/// Fold topic statuses into session and per-group progress.
///
/// Topics not present in the catalog are ignored.
pub fn calculate(catalog: &Catalog, topics: &[TopicState]) -> SessionProgress {
    let known = topics.iter().filter(|t| catalog.topic(&t.id).is_some());
    let total_topics = catalog.topic_count();
    let completed_topics = count_completed(known);

    let per_group = catalog
        .groups()
        .iter()
        .map(|group| {
            let total = group.len();
            let completed = count_completed(topics.iter().filter(|t| {
                catalog
                    .topic(&t.id)
                    .is_some_and(|def| def.group_id == group.id)
            }));
            GroupProgress {
                group_id: group.id.clone(),
                total,
                completed,
                percent_complete: percent(completed, total),
            }
        })
        .collect();

    SessionProgress {
        total_topics,
        completed_topics,
        percent_complete: percent(completed_topics, total_topics),
        per_group,
    }
}
