//! Elicit: guided knowledge-elicitation interviews.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod export;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
