use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::MetadataError;

/// Upper bound on candidate ids returned by a single lookup.
pub const DEFAULT_MAX_RESULTS: usize = 100;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MetadataStoreConfig {
    /// SQLite database file. Parent directories are created on open.
    pub path: PathBuf,
    /// Global cap on candidate set size.
    pub max_results: usize,
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/metadata.sqlite"),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl MetadataStoreConfig {
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.path.as_os_str().is_empty() {
            return Err(MetadataError::Config("path is empty".into()));
        }
        if self.max_results == 0 {
            return Err(MetadataError::Config("max_results must be > 0".into()));
        }
        Ok(())
    }
}
