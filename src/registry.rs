//! Session summary registry.
//!
//! Once a session reaches its terminal state, the caller records a
//! [`SessionSummary`] here. The session core itself knows nothing about
//! persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RegistryError;

/// Record of one completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub participant_name: String,
    pub role_label: String,
    pub project_label: String,
    pub completed_at: DateTime<Utc>,
}

/// Persistence for completed-session summaries.
#[async_trait]
pub trait SummaryRegistry: Send + Sync {
    /// Record a summary. Returns `false` if the session id is already
    /// registered; the existing record is kept.
    async fn record(&self, summary: &SessionSummary) -> Result<bool, RegistryError>;

    async fn get(&self, session_id: Uuid) -> Result<Option<SessionSummary>, RegistryError>;

    /// Summaries for one project, oldest first.
    async fn find_by_project(&self, project: &str) -> Result<Vec<SessionSummary>, RegistryError>;

    /// Distinct project labels, sorted.
    async fn list_projects(&self) -> Result<Vec<String>, RegistryError>;
}

/// Trim the project label and reject blank ones.
fn normalized(summary: &SessionSummary) -> Result<SessionSummary, RegistryError> {
    let project = summary.project_label.trim();
    if project.is_empty() {
        return Err(RegistryError::EmptyProject);
    }
    Ok(SessionSummary {
        project_label: project.to_string(),
        ..summary.clone()
    })
}

fn by_project(records: &BTreeMap<Uuid, SessionSummary>, project: &str) -> Vec<SessionSummary> {
    let project = project.trim();
    let mut found: Vec<SessionSummary> = records
        .values()
        .filter(|s| s.project_label == project)
        .cloned()
        .collect();
    found.sort_by_key(|s| s.completed_at);
    found
}

fn projects(records: &BTreeMap<Uuid, SessionSummary>) -> Vec<String> {
    records
        .values()
        .map(|s| s.project_label.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ── In-memory ───────────────────────────────────────────────────────

/// Registry held in memory.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<BTreeMap<Uuid, SessionSummary>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryRegistry for MemoryRegistry {
    async fn record(&self, summary: &SessionSummary) -> Result<bool, RegistryError> {
        let summary = normalized(summary)?;
        let mut records = self.records.write().await;
        if records.contains_key(&summary.session_id) {
            return Ok(false);
        }
        records.insert(summary.session_id, summary);
        Ok(true)
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<SessionSummary>, RegistryError> {
        Ok(self.records.read().await.get(&session_id).cloned())
    }

    async fn find_by_project(&self, project: &str) -> Result<Vec<SessionSummary>, RegistryError> {
        Ok(by_project(&*self.records.read().await, project))
    }

    async fn list_projects(&self) -> Result<Vec<String>, RegistryError> {
        Ok(projects(&*self.records.read().await))
    }
}

// ── JSON file ───────────────────────────────────────────────────────

/// Registry stored as a JSON object keyed by session id.
///
/// The whole file is read on every call and rewritten on every record;
/// registries hold one entry per completed interview, so they stay small.
pub struct JsonFileRegistry {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file is an empty registry. A file that cannot be parsed is
    /// logged and treated as empty.
    async fn read_all(&self) -> Result<BTreeMap<Uuid, SessionSummary>, RegistryError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(path = %self.path.display(), "Unreadable session registry, treating as empty: {}", e);
                Ok(BTreeMap::new())
            }
        }
    }

    async fn write_all(&self, records: &BTreeMap<Uuid, SessionSummary>) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl SummaryRegistry for JsonFileRegistry {
    async fn record(&self, summary: &SessionSummary) -> Result<bool, RegistryError> {
        let summary = normalized(summary)?;
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        if records.contains_key(&summary.session_id) {
            info!(session_id = %summary.session_id, "Session already registered");
            return Ok(false);
        }
        let session_id = summary.session_id;
        let project = summary.project_label.clone();
        records.insert(session_id, summary);
        self.write_all(&records).await?;
        info!(session_id = %session_id, project = %project, "Session summary recorded");
        Ok(true)
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<SessionSummary>, RegistryError> {
        Ok(self.read_all().await?.remove(&session_id))
    }

    async fn find_by_project(&self, project: &str) -> Result<Vec<SessionSummary>, RegistryError> {
        Ok(by_project(&self.read_all().await?, project))
    }

    async fn list_projects(&self) -> Result<Vec<String>, RegistryError> {
        Ok(projects(&self.read_all().await?))
    }
}
