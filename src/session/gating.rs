//! Gating engine: which groups and topics are currently reachable, and
//! which topic comes next.
//!
//! Groups unlock strictly left to right: a group is reachable once every
//! group before it is fully completed. Completed topics stay reachable for
//! read-only review. All functions here are pure.

use super::model::{TopicState, TopicStatus};
use crate::catalog::{Catalog, Topic};

/// Status of a topic, looked up by id. Unknown ids count as not started.
fn status_of(catalog: &Catalog, topics: &[TopicState], topic_id: &str) -> TopicStatus {
    let aligned = catalog
        .topic_position(topic_id)
        .and_then(|pos| topics.get(pos))
        .filter(|t| t.id == topic_id);
    aligned
        .or_else(|| topics.iter().find(|t| t.id == topic_id))
        .map(|t| t.status)
        .unwrap_or_default()
}

/// Whether every topic of a group is completed.
pub fn is_group_complete(group_id: &str, catalog: &Catalog, topics: &[TopicState]) -> bool {
    let defs = catalog.topics_in(group_id);
    !defs.is_empty()
        && defs
            .iter()
            .all(|t| status_of(catalog, topics, &t.id).is_completed())
}

/// Whether a group is reachable: it is the first group, or every topic in
/// every preceding group is completed. Unknown groups are unreachable.
pub fn is_group_accessible(group_id: &str, catalog: &Catalog, topics: &[TopicState]) -> bool {
    let Some(position) = catalog.group_position(group_id) else {
        return false;
    };
    catalog.groups()[..position]
        .iter()
        .all(|g| is_group_complete(&g.id, catalog, topics))
}

/// Whether a topic is reachable: completed topics always are (review);
/// otherwise it follows its group. Unknown topics are unreachable.
pub fn is_topic_accessible(topic_id: &str, catalog: &Catalog, topics: &[TopicState]) -> bool {
    let Some(def) = catalog.topic(topic_id) else {
        return false;
    };
    if status_of(catalog, topics, topic_id).is_completed() {
        return true;
    }
    is_group_accessible(&def.group_id, catalog, topics)
}

/// Whether every topic in the catalog is completed.
pub fn is_catalog_complete(catalog: &Catalog, topics: &[TopicState]) -> bool {
    catalog
        .topics()
        .iter()
        .all(|t| status_of(catalog, topics, &t.id).is_completed())
}

/// The next topic to open after a completion.
///
/// Scans groups in catalog order, skipping fully completed groups, and
/// returns the first not-started topic of the first incomplete group. Groups
/// are never interleaved: if that group has no not-started topic left, there
/// is no next topic.
pub fn next_topic<'a>(catalog: &'a Catalog, topics: &[TopicState]) -> Option<&'a Topic> {
    let group = catalog
        .groups()
        .iter()
        .find(|g| !is_group_complete(&g.id, catalog, topics))?;
    catalog
        .topics_in(&group.id)
        .iter()
        .find(|t| status_of(catalog, topics, &t.id) == TopicStatus::NotStarted)
}
