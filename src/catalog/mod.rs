//! Topic/group catalog: the immutable definition of an interview.
//!
//! A catalog is an ordered list of groups, each holding an ordered,
//! non-empty list of topics. It is validated once at load time and shared
//! read-only by every session built from it.

pub mod demo;
pub mod loader;
pub mod model;

pub use demo::demo_catalog;
pub use loader::CatalogFile;
pub use model::{Catalog, Group, GroupSpec, ScriptedResponses, Topic, TopicSpec};
