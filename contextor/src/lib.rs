//! Turn orchestration for filtered retrieval.
//!
//! Public API: [`Orchestrator`] behind the [`AgentBackend`] capability. A turn
//! asks the [`ToolPlanner`] whether to retrieve; if so it looks up a
//! [`rag_core::CandidateIdSet`] in the metadata store, searches only within it,
//! reranks the hits and has the synthesis model answer from the survivors.
//! When no document matches, the turn answers without calling the model.

mod api_types;
mod cfg;
mod error;
mod observer;
mod orchestrator;
mod planner;
pub mod prompt;
mod rerank;

pub use api_types::{Stage, TurnAnswer, TurnOutcome, TurnTrace, UsedChunk};
pub use cfg::{PlannerKind, RerankerKind, TurnConfig};
pub use error::{RerankError, TurnError};
pub use observer::{IndicatifObserver, NoopObserver, TracingObserver, TurnObserver};
pub use orchestrator::{AgentBackend, Orchestrator};
pub use planner::{LlmPlanner, Plan, RulePlanner, ToolPlanner};
pub use rerank::{
    EmbeddingReranker, LlmReranker, RerankOutcome, Reranker, ResilientReranker, ThresholdReranker,
};
