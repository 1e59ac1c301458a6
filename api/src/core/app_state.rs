use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ai_llm_service::LlmServiceProfiles;
use contextor::Orchestrator;
use ingestion::IngestionPipeline;
use metadata_store::MetadataStore;

/// Shared state for all HTTP handlers. Built once at bootstrap.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub metadata: Arc<dyn MetadataStore>,
    /// `None` disables `POST /ingest`.
    pub ingestion: Option<Arc<IngestionPipeline>>,
    /// Directory ingested when a request gives no path.
    pub ingest_root: Option<PathBuf>,
    /// Model profiles probed by `GET /health`; absent in offline setups.
    pub llm: Option<Arc<LlmServiceProfiles>>,
    /// Upper bound on a client-supplied turn timeout.
    pub max_turn_timeout: Duration,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let metadata = orchestrator.metadata().clone();
        let max_turn_timeout = orchestrator.config().turn_timeout() * 4;
        Self {
            orchestrator,
            metadata,
            ingestion: None,
            ingest_root: None,
            llm: None,
            max_turn_timeout,
        }
    }

    pub fn with_ingestion(mut self, pipeline: Arc<IngestionPipeline>, root: Option<PathBuf>) -> Self {
        self.ingestion = Some(pipeline);
        self.ingest_root = root;
        self
    }

    pub fn with_llm(mut self, llm: Arc<LlmServiceProfiles>) -> Self {
        self.llm = Some(llm);
        self
    }
}
