//! Builds every component from [`AppConfig`] and checks them before use.

use std::sync::Arc;

use ai_llm_service::{AiLlmError, LlmServiceProfiles, ModelRole};
use api::AppState;
use contextor::{Orchestrator, TurnError};
use ingestion::{IngestError, IngestionPipeline};
use metadata_store::{MetadataError, SqliteMetadataStore};
use rag_core::{ProfileEmbedder, ProfileGenerator, ServiceError, TextGenerator};
use rag_store::{BackendKind, RagError, RagStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Startup failure; the process exits.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("model profiles: {0}")]
    Models(#[from] AiLlmError),

    #[error("embedding probe failed: {0}")]
    EmbeddingProbe(#[source] ServiceError),

    #[error("metadata store: {0}")]
    Metadata(#[from] MetadataError),

    #[error("vector index: {0}")]
    Vectors(#[from] RagError),

    #[error("turn config: {0}")]
    Turn(#[from] TurnError),

    #[error("ingestion config: {0}")]
    Ingest(#[from] IngestError),
}

/// Wired components shared by all subcommands.
pub struct Runtime {
    pub cfg: AppConfig,
    pub llm: Arc<LlmServiceProfiles>,
    pub orchestrator: Arc<Orchestrator>,
    pub ingestion: Arc<IngestionPipeline>,
}

impl Runtime {
    pub fn app_state(&self) -> AppState {
        AppState::new(self.orchestrator.clone())
            .with_ingestion(self.ingestion.clone(), self.cfg.server.ingest_root.clone())
            .with_llm(self.llm.clone())
    }
}

/// Model profiles alone; enough for `health`, which must work while a
/// model endpoint is down.
pub fn model_profiles(cfg: &AppConfig) -> Result<Arc<LlmServiceProfiles>, BootstrapError> {
    let m = &cfg.models;
    Ok(Arc::new(LlmServiceProfiles::new(
        m.synthesis.clone(),
        m.auxiliary.clone(),
        m.embedding.clone(),
        m.health_timeout_secs,
    )?))
}

/// True when chunk vectors live only in process memory while the metadata
/// rows they belong to are written to disk.
fn vectors_are_ephemeral(cfg: &AppConfig) -> bool {
    cfg.vectors.backend == BackendKind::Memory
}

/// Validates configuration, probes the embedding dimension and opens both stores.
///
/// # Errors
/// Any invalid setting, an unreachable embedding service, or an embedding
/// dimension different from `vectors.embedding_dim` is fatal.
pub async fn bootstrap(cfg: AppConfig, show_progress: bool) -> Result<Runtime, BootstrapError> {
    cfg.turn.validate()?;
    cfg.ingest.validate()?;
    cfg.vectors.validate()?;

    let llm = model_profiles(&cfg)?;

    let embedder = ProfileEmbedder::new(llm.clone(), cfg.vectors.embedding_dim);
    embedder
        .probe()
        .await
        .map_err(BootstrapError::EmbeddingProbe)?;

    let metadata = Arc::new(SqliteMetadataStore::open(&cfg.metadata)?);
    if vectors_are_ephemeral(&cfg) {
        warn!(
            metadata = %cfg.metadata.path.display(),
            "memory vector backend: vectors are dropped on exit but metadata rows persist; \
             re-ingest after every restart or switch to qdrant"
        );
    }
    let vectors = RagStore::new(cfg.vectors.clone(), Arc::new(embedder))?;
    vectors.ensure_ready().await?;

    let synthesis: Arc<dyn TextGenerator> =
        Arc::new(ProfileGenerator::new(llm.clone(), ModelRole::Synthesis));
    let auxiliary: Arc<dyn TextGenerator> =
        Arc::new(ProfileGenerator::new(llm.clone(), ModelRole::Auxiliary));

    let orchestrator = Arc::new(Orchestrator::new(
        cfg.turn.clone(),
        metadata.clone(),
        vectors.clone(),
        synthesis,
        auxiliary.clone(),
    )?);
    let ingestion = Arc::new(
        IngestionPipeline::new(cfg.ingest.clone(), metadata, vectors)?
            .with_auxiliary(auxiliary)
            .with_progress(show_progress),
    );

    info!(
        backend = orchestrator.vectors().backend_name(),
        dim = cfg.vectors.embedding_dim,
        metadata = %cfg.metadata.path.display(),
        "bootstrap complete"
    );
    Ok(Runtime {
        cfg,
        llm,
        orchestrator,
        ingestion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_is_flagged_as_ephemeral() {
        let mut cfg = AppConfig::default();
        cfg.vectors.backend = BackendKind::Qdrant;
        assert!(!vectors_are_ephemeral(&cfg));

        cfg.vectors.backend = BackendKind::Memory;
        assert!(vectors_are_ephemeral(&cfg));
    }
}
