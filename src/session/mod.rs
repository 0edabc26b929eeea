//! Interview sessions.
//!
//! - [`store`] holds the mutable state and applies [`Transition`]s.
//! - [`gating`] and [`progress`] are pure functions over topic states.
//! - [`controller`] is the public [`Session`] object the presentation layer
//!   drives.

pub mod controller;
pub mod gating;
pub mod model;
pub mod progress;
pub mod store;

pub use controller::{Command, Session};
pub use model::{
    DialoguePhase, EntryKind, Role, Selection, SessionEvent, SessionPhase, TopicState,
    TopicStatus, TranscriptEntry, SKIP_MARKER,
};
pub use progress::{GroupProgress, SessionProgress};
pub use store::{SessionSnapshot, SessionStore, Transition};
