//! Error types for the elicitation engine.
//!
//! In-session requests never fail: an invalid request is a rejected no-op.
//! The errors here cover configuration, catalog loading, and the summary
//! registry, all of which are surfaced to the caller synchronously.

use std::path::PathBuf;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Catalog definition errors. All of these are fatal at load time.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog has no groups")]
    Empty,

    #[error("Group {group_id} has no topics")]
    EmptyGroup { group_id: String },

    #[error("Duplicate group id: {0}")]
    DuplicateGroup(String),

    #[error("Duplicate topic id: {0}")]
    DuplicateTopic(String),

    #[error("Blank {kind} id at position {position}")]
    BlankId { kind: &'static str, position: usize },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Session summary registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Project label must not be empty")]
    EmptyProject,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
