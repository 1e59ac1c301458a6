//! One conversational turn: plan, look up metadata, search, rerank, synthesize.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metadata_store::{MetadataQuery, MetadataStore};
use rag_core::text::preview;
use rag_core::{BoxFuture, CandidateIdSet, ScoredCandidate, TextGenerator};
use rag_store::{RagStore, SearchOutcome};
use tracing::{debug, info, instrument, warn};

use crate::api_types::{Stage, TurnAnswer, TurnOutcome, TurnTrace, UsedChunk};
use crate::cfg::{PlannerKind, RerankerKind, TurnConfig};
use crate::error::TurnError;
use crate::observer::{TracingObserver, TurnObserver};
use crate::planner::{LlmPlanner, Plan, RulePlanner, ToolPlanner};
use crate::prompt::{DEFAULT_SYSTEM, NO_MATCH_ANSWER, build_user_prompt};
use crate::rerank::{EmbeddingReranker, LlmReranker, Reranker, ResilientReranker, ThresholdReranker};

const PREVIEW_CHARS: usize = 160;

/// Anything that can answer a user turn.
pub trait AgentBackend: Send + Sync {
    fn respond<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<TurnAnswer, TurnError>>;
}

/// Turn state machine over the metadata store, vector index, reranker and
/// synthesis model. Shared across turns; each turn owns its intermediate data.
pub struct Orchestrator {
    metadata: Arc<dyn MetadataStore>,
    vectors: RagStore,
    reranker: ResilientReranker,
    synthesizer: Arc<dyn TextGenerator>,
    planner: Arc<dyn ToolPlanner>,
    cfg: TurnConfig,
}

impl Orchestrator {
    /// Wires planner and reranker according to `cfg`.
    ///
    /// `auxiliary` serves the LLM planner and the LLM reranker; the embedding
    /// reranker reuses the vector store's embedder.
    pub fn new(
        cfg: TurnConfig,
        metadata: Arc<dyn MetadataStore>,
        vectors: RagStore,
        synthesizer: Arc<dyn TextGenerator>,
        auxiliary: Arc<dyn TextGenerator>,
    ) -> Result<Self, TurnError> {
        cfg.validate()?;
        let planner: Arc<dyn ToolPlanner> = match cfg.planner {
            PlannerKind::Rule => Arc::new(RulePlanner),
            PlannerKind::Llm => Arc::new(LlmPlanner::new(auxiliary.clone())),
        };
        let primary: Arc<dyn Reranker> = match cfg.reranker {
            RerankerKind::Llm => Arc::new(LlmReranker::new(auxiliary, cfg.rerank_concurrency)),
            RerankerKind::Embedding => Arc::new(EmbeddingReranker::new(
                vectors.embedder().clone(),
                cfg.rerank_concurrency,
            )),
        };
        let reranker = ResilientReranker::new(
            primary,
            ThresholdReranker {
                threshold: cfg.fallback_score_threshold,
            },
        );
        Ok(Self {
            metadata,
            vectors,
            reranker,
            synthesizer,
            planner,
            cfg,
        })
    }

    pub fn with_planner(mut self, planner: Arc<dyn ToolPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_reranker(mut self, primary: Arc<dyn Reranker>) -> Self {
        self.reranker = ResilientReranker::new(
            primary,
            ThresholdReranker {
                threshold: self.cfg.fallback_score_threshold,
            },
        );
        self
    }

    pub fn config(&self) -> &TurnConfig {
        &self.cfg
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn vectors(&self) -> &RagStore {
        &self.vectors
    }

    /// Runs a turn under the configured deadline.
    pub async fn respond_with_timeout(
        &self,
        query: &str,
        deadline: Duration,
    ) -> Result<TurnAnswer, TurnError> {
        self.respond_observed(query, &TracingObserver, deadline).await
    }

    /// Runs a turn, reporting progress to `observer`.
    ///
    /// When `deadline` elapses the in-flight stage is dropped and
    /// [`TurnError::Timeout`] is returned.
    #[instrument(skip_all, fields(query = %preview(query, 80), deadline_ms = deadline.as_millis() as u64))]
    pub async fn respond_observed(
        &self,
        query: &str,
        observer: &dyn TurnObserver,
        deadline: Duration,
    ) -> Result<TurnAnswer, TurnError> {
        let result = match tokio::time::timeout(deadline, self.run_turn(query, observer)).await {
            Ok(r) => r,
            Err(_) => Err(TurnError::Timeout(deadline)),
        };
        match &result {
            Ok(answer) => {
                info!(
                    outcome = ?answer.outcome,
                    context = answer.context.len(),
                    degraded = answer.degraded_rerank.is_some(),
                    "turn done"
                );
                observer.finish(&format!("{:?}", answer.outcome));
            }
            Err(e) => {
                warn!(error = %e, "turn failed");
                observer.stage(Stage::Error);
                observer.finish("error");
            }
        }
        result
    }

    async fn run_turn(
        &self,
        query: &str,
        observer: &dyn TurnObserver,
    ) -> Result<TurnAnswer, TurnError> {
        let mut trace = TurnTrace::default();
        enter(&mut trace, observer, Stage::Start);

        let plan = self.planner.plan(query).await;
        record_tool(&mut trace, observer, plan.tool_name());
        debug!(planner = self.planner.name(), tool = plan.tool_name(), "plan chosen");

        let filter = match plan {
            Plan::Direct => {
                enter(&mut trace, observer, Stage::Synthesize);
                let answer = self.synthesize(query, &[]).await?;
                enter(&mut trace, observer, Stage::Done);
                return Ok(TurnAnswer {
                    answer,
                    outcome: TurnOutcome::Direct,
                    context: Vec::new(),
                    trace,
                    degraded_rerank: None,
                });
            }
            Plan::Retrieve { filter } => filter,
        };

        enter(&mut trace, observer, Stage::MetadataLookup);
        let candidates = self.lookup(&filter, &mut trace, observer).await?;
        trace.candidate_count = Some(candidates.len());
        trace.candidates_truncated = candidates.is_truncated();

        enter(&mut trace, observer, Stage::FilteredSearch);
        let hits = match self.search(&candidates, query, &mut trace, observer).await? {
            SearchOutcome::NoEligibleDocuments => Vec::new(),
            SearchOutcome::Hits(h) => h,
        };
        trace.retrieved = hits.len();

        if hits.is_empty() {
            info!(candidates = candidates.len(), "no matching documents; skipping synthesis");
            enter(&mut trace, observer, Stage::Done);
            return Ok(TurnAnswer {
                answer: NO_MATCH_ANSWER.to_string(),
                outcome: TurnOutcome::NoMatchingDocuments,
                context: Vec::new(),
                trace,
                degraded_rerank: None,
            });
        }

        enter(&mut trace, observer, Stage::Rerank);
        record_tool(
            &mut trace,
            observer,
            &format!("rerank:{}", self.reranker.primary_name()),
        );
        let reranked = self
            .reranker
            .rerank(query, hits, self.cfg.rerank_top_n)
            .await;

        if reranked.candidates.is_empty() {
            info!(
                retrieved = trace.retrieved,
                degraded = reranked.degraded.is_some(),
                "rerank kept no chunks; skipping synthesis"
            );
            enter(&mut trace, observer, Stage::Done);
            return Ok(TurnAnswer {
                answer: NO_MATCH_ANSWER.to_string(),
                outcome: TurnOutcome::NoMatchingDocuments,
                context: Vec::new(),
                trace,
                degraded_rerank: reranked.degraded,
            });
        }

        enter(&mut trace, observer, Stage::Synthesize);
        let answer = self.synthesize(query, &reranked.candidates).await?;
        enter(&mut trace, observer, Stage::Done);

        Ok(TurnAnswer {
            answer,
            outcome: TurnOutcome::Answered,
            context: reranked.candidates.iter().map(used_chunk).collect(),
            trace,
            degraded_rerank: reranked.degraded,
        })
    }

    async fn lookup(
        &self,
        filter: &MetadataQuery,
        trace: &mut TurnTrace,
        observer: &dyn TurnObserver,
    ) -> Result<CandidateIdSet, TurnError> {
        let metadata = self.metadata.as_ref();
        retry_once(Stage::MetadataLookup, trace, observer, move || async move {
            metadata
                .find_documents(filter)
                .await
                .map_err(TurnError::from_metadata)
        })
        .await
    }

    async fn search(
        &self,
        candidates: &CandidateIdSet,
        query: &str,
        trace: &mut TurnTrace,
        observer: &dyn TurnObserver,
    ) -> Result<SearchOutcome, TurnError> {
        let vectors = &self.vectors;
        let width = self.cfg.retrieval_width;
        retry_once(Stage::FilteredSearch, trace, observer, move || async move {
            vectors
                .filtered_search(candidates, query, Some(width))
                .await
                .map_err(TurnError::from_vector)
        })
        .await
    }

    async fn synthesize(
        &self,
        query: &str,
        context: &[ScoredCandidate],
    ) -> Result<String, TurnError> {
        let prompt = build_user_prompt(query, context, self.cfg.max_ctx_chars);
        let answer = self
            .synthesizer
            .complete(&prompt, Some(DEFAULT_SYSTEM))
            .await
            .map_err(|e| TurnError::Synthesis(e.to_string()))?;
        Ok(answer.trim().to_string())
    }
}

impl AgentBackend for Orchestrator {
    fn respond<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<TurnAnswer, TurnError>> {
        Box::pin(self.respond_with_timeout(query, self.cfg.turn_timeout()))
    }
}

fn enter(trace: &mut TurnTrace, observer: &dyn TurnObserver, stage: Stage) {
    debug!(?stage, "enter stage");
    trace.stages.push(stage);
    observer.stage(stage);
}

fn record_tool(trace: &mut TurnTrace, observer: &dyn TurnObserver, name: &str) {
    trace.tools.push(name.to_string());
    observer.tool(name);
}

/// Runs `op`, repeating it once after a backing-store failure.
async fn retry_once<T, F, Fut>(
    stage: Stage,
    trace: &mut TurnTrace,
    observer: &dyn TurnObserver,
    op: F,
) -> Result<T, TurnError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TurnError>>,
{
    match op().await {
        Err(e) if e.is_backing_store() => {
            warn!(?stage, error = %e, "backing store failed; retrying once");
            trace.retries += 1;
            observer.retry(stage, &e.to_string());
            op().await
        }
        other => other,
    }
}

fn used_chunk(c: &ScoredCandidate) -> UsedChunk {
    UsedChunk {
        doc_id: c.doc_id.to_string(),
        chunk_index: c.chunk_index,
        source_path: c.source_path.clone(),
        score: c.score,
        preview: preview(&c.text, PREVIEW_CHARS),
    }
}
