//! Catalog loading from JSON files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::model::{Catalog, GroupSpec};
use crate::error::CatalogError;

/// On-disk catalog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub groups: Vec<GroupSpec>,
}

impl Catalog {
    /// Parse and validate a JSON catalog document.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.groups)
    }

    /// Read, parse, and validate a JSON catalog file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            groups = catalog.groups().len(),
            topics = catalog.topic_count(),
            "Catalog loaded"
        );
        Ok(catalog)
    }
}
