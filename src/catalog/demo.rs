//! Built-in catalog used when no catalog file is configured.
//!
//! Walks a departing model owner through a credit-loss forecasting handoff.

use super::model::{Catalog, GroupSpec, ScriptedResponses, TopicSpec};
use crate::error::CatalogError;

fn topic(
    id: &str,
    title: &str,
    question: &str,
    follow_up: &str,
    initial_reply: Option<&str>,
) -> TopicSpec {
    TopicSpec {
        id: id.to_string(),
        title: title.to_string(),
        question: question.to_string(),
        follow_up_question: Some(follow_up.to_string()),
        responses: ScriptedResponses {
            initial: initial_reply.map(String::from),
            follow_up: None,
        },
        preview: None,
    }
}

/// The demo catalog: three groups, seven topics.
pub fn demo_catalog() -> Result<Catalog, CatalogError> {
    Catalog::new(vec![
        GroupSpec {
            id: "overview".into(),
            title: "Project Overview".into(),
            description: Some("What the work is and who depends on it".into()),
            topics: vec![
                topic(
                    "purpose",
                    "Purpose",
                    "In a few sentences, what does the loss forecast model do and why does it exist?",
                    "Who downstream relies on its output, and how often?",
                    Some("That's a helpful framing. Who downstream relies on the forecast, and on what cadence?"),
                ),
                topic(
                    "stakeholders",
                    "Stakeholders",
                    "Who are the key people you work with on this model?",
                    "Is there anyone whose sign-off is required before a change ships?",
                    None,
                ),
            ],
        },
        GroupSpec {
            id: "decisions".into(),
            title: "Decisions & Thresholds".into(),
            description: Some("Rules that live in your head rather than in the code".into()),
            topics: vec![
                topic(
                    "volatility",
                    "Volatility switch",
                    "What criteria do you use to switch supplier timing from normal to volatile conditions?",
                    "Where did those cut-offs originally come from?",
                    Some("Interesting. Were those cut-offs calibrated against a specific period?"),
                ),
                topic(
                    "overlays",
                    "Overlays",
                    "How do you decide the buffer percentage applied to new products?",
                    "Has that buffer ever been revisited, and what triggered it?",
                    None,
                ),
                topic(
                    "overrides",
                    "Manual overrides",
                    "Are there any manual overrides applied after the model runs?",
                    "How would a newcomer know when an override is needed?",
                    None,
                ),
            ],
        },
        GroupSpec {
            id: "operations".into(),
            title: "Operations".into(),
            description: None,
            topics: vec![
                topic(
                    "runbook",
                    "Quarterly run",
                    "Walk me through a typical quarterly run, start to finish.",
                    "Which step is most likely to go wrong?",
                    None,
                ),
                topic(
                    "gotchas",
                    "Gotchas",
                    "What is the one thing you wish someone had told you when you inherited this?",
                    "Anything else a successor should watch out for?",
                    None,
                ),
            ],
        },
    ])
}
