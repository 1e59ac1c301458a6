use serde::Deserialize;

use crate::errors::IngestError;

/// Ingestion settings. Every field has a default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Lowercase file extensions to load.
    pub extensions: Vec<String>,
    /// Jurisdiction used when a file has no front-matter tag and is not classified.
    pub default_jurisdiction: String,
    /// Files larger than this are skipped.
    pub max_file_bytes: u64,
    pub chunk_chars: usize,
    pub chunk_overlap: usize,
    pub embed_concurrency: usize,
    /// Ask the auxiliary model for a category when no jurisdiction is given.
    pub classify: bool,
    pub cluster: bool,
    /// Fixed cluster count; `None` picks 2 (capped at the document count).
    pub clusters: Option<usize>,
    pub cluster_seed: u64,
    pub kmeans_iterations: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: ["md", "txt", "rst", "html", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_jurisdiction: "personal".into(),
            max_file_bytes: 5 * 1024 * 1024,
            chunk_chars: 1200,
            chunk_overlap: 150,
            embed_concurrency: 4,
            classify: false,
            cluster: true,
            clusters: None,
            cluster_seed: 42,
            kmeans_iterations: 50,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.extensions.is_empty() {
            return Err(IngestError::Config("extensions must not be empty".into()));
        }
        if self.chunk_chars == 0 {
            return Err(IngestError::Config("chunk_chars must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_chars {
            return Err(IngestError::Config(
                "chunk_overlap must be smaller than chunk_chars".into(),
            ));
        }
        if self.clusters == Some(0) {
            return Err(IngestError::Config("clusters must be > 0 when set".into()));
        }
        if self.default_jurisdiction.trim().is_empty() {
            return Err(IngestError::Config("default_jurisdiction is empty".into()));
        }
        Ok(())
    }

    pub(crate) fn accepts_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }
}
