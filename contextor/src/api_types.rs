//! Public API types re-used by external crates (e.g., the HTTP API layer).

use serde::Serialize;

/// Orchestrator stages. `Error` is reachable from any stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    MetadataLookup,
    FilteredSearch,
    Rerank,
    Synthesize,
    Done,
    Error,
}

/// How a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Answered from retrieved, reranked context.
    Answered,
    /// Answered without retrieval.
    Direct,
    /// No document satisfied the metadata criteria; synthesis was skipped.
    NoMatchingDocuments,
}

/// Stages visited and tools invoked during one turn.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TurnTrace {
    pub stages: Vec<Stage>,
    pub tools: Vec<String>,
    pub retries: u32,
    /// Size of the candidate id set, when the metadata stage ran.
    pub candidate_count: Option<usize>,
    pub candidates_truncated: bool,
    /// Hits returned by filtered search.
    pub retrieved: usize,
}

/// A compact record of a context chunk that was fed to the model.
#[derive(Clone, Debug, Serialize)]
pub struct UsedChunk {
    pub doc_id: String,
    pub chunk_index: u32,
    pub source_path: String,
    pub score: f32,
    pub preview: String,
}

/// Final answer together with the context passed to the model.
#[derive(Clone, Debug, Serialize)]
pub struct TurnAnswer {
    pub answer: String,
    pub outcome: TurnOutcome,
    pub context: Vec<UsedChunk>,
    pub trace: TurnTrace,
    /// Set when the primary reranker failed and the threshold fallback ran.
    pub degraded_rerank: Option<String>,
}
