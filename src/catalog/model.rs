//! Catalog data model: groups and topics in interview order.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Author-scripted replies for a topic, keyed by dialogue phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedResponses {
    /// Reply to the participant's first answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    /// Reply to the participant's follow-up answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
}

/// A topic as written by the catalog author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    pub id: String,
    pub title: String,
    /// Opening question asked when the topic is first selected.
    pub question: String,
    /// Static follow-up used when no scripted reply exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_question: Option<String>,
    #[serde(default)]
    pub responses: ScriptedResponses,
    /// Illustrative payload for the presentation layer. Opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<serde_json::Value>,
}

/// A group as written by the catalog author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub topics: Vec<TopicSpec>,
}

/// A topic placed in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub question: String,
    pub follow_up_question: Option<String>,
    pub responses: ScriptedResponses,
    pub preview: Option<serde_json::Value>,
}

/// An ordered bucket of topics.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(skip)]
    range: Range<usize>,
}

impl Group {
    /// Number of topics in the group.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Always false for a validated catalog.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Immutable, validated catalog of groups and topics.
///
/// Topics are stored flattened in catalog order; each group owns a
/// contiguous slice of them.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    groups: Vec<Group>,
    topics: Vec<Topic>,
    #[serde(skip)]
    group_index: HashMap<String, usize>,
    #[serde(skip)]
    topic_index: HashMap<String, usize>,
}

impl Catalog {
    /// Validate author specs and build the catalog.
    ///
    /// Rejects an empty catalog, empty groups, blank ids, and duplicate ids.
    pub fn new(specs: Vec<GroupSpec>) -> Result<Self, CatalogError> {
        if specs.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut groups = Vec::with_capacity(specs.len());
        let mut topics = Vec::new();
        let mut group_index = HashMap::new();
        let mut topic_index = HashMap::new();

        for (group_pos, spec) in specs.into_iter().enumerate() {
            let group_id = spec.id.trim().to_string();
            if group_id.is_empty() {
                return Err(CatalogError::BlankId {
                    kind: "group",
                    position: group_pos,
                });
            }
            if spec.topics.is_empty() {
                return Err(CatalogError::EmptyGroup { group_id });
            }
            if group_index.insert(group_id.clone(), group_pos).is_some() {
                return Err(CatalogError::DuplicateGroup(group_id));
            }

            let start = topics.len();
            for (topic_pos, topic) in spec.topics.into_iter().enumerate() {
                let topic_id = topic.id.trim().to_string();
                if topic_id.is_empty() {
                    return Err(CatalogError::BlankId {
                        kind: "topic",
                        position: topic_pos,
                    });
                }
                if topic_index.insert(topic_id.clone(), topics.len()).is_some() {
                    return Err(CatalogError::DuplicateTopic(topic_id));
                }
                topics.push(Topic {
                    id: topic_id,
                    group_id: group_id.clone(),
                    title: topic.title,
                    question: topic.question,
                    follow_up_question: topic.follow_up_question,
                    responses: topic.responses,
                    preview: topic.preview,
                });
            }

            groups.push(Group {
                id: group_id,
                title: spec.title,
                description: spec.description,
                range: start..topics.len(),
            });
        }

        Ok(Self {
            groups,
            topics,
            group_index,
            topic_index,
        })
    }

    /// Groups in catalog order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// All topics in catalog order.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.group_position(group_id).map(|pos| &self.groups[pos])
    }

    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topic_position(topic_id).map(|pos| &self.topics[pos])
    }

    /// Index of a group in catalog order.
    pub fn group_position(&self, group_id: &str) -> Option<usize> {
        self.group_index.get(group_id).copied()
    }

    /// Index of a topic in the flattened catalog order.
    pub fn topic_position(&self, topic_id: &str) -> Option<usize> {
        self.topic_index.get(topic_id).copied()
    }

    /// Topics belonging to a group, in order. Empty for an unknown group.
    pub fn topics_in(&self, group_id: &str) -> &[Topic] {
        match self.group(group_id) {
            Some(group) => &self.topics[group.range.clone()],
            None => &[],
        }
    }

    /// The group a topic belongs to.
    pub fn group_of(&self, topic_id: &str) -> Option<&Group> {
        self.topic(topic_id).and_then(|t| self.group(&t.group_id))
    }

    /// Total number of topics.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}
