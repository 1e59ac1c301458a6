//! Second-stage scoring of retrieved candidates.
//!
//! Every reranker returns `min(n, input.len())` candidates ordered by the new
//! score, ties broken by `(doc_id, chunk_index)`. Empty input never reaches a
//! model.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rag_core::embed::cosine;
use rag_core::text::safe_truncate;
use rag_core::{BoxFuture, EmbeddingsProvider, ScoredCandidate, TextGenerator, sort_by_rank};
use rag_store::embed_pool::embed_texts;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::RerankError;

/// Characters of candidate text shown to a scoring model.
const PASSAGE_CHARS: usize = 2000;

pub trait Reranker: Send + Sync {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: Vec<ScoredCandidate>,
        n: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RerankError>>;

    fn name(&self) -> &'static str;
}

fn finish(mut scored: Vec<ScoredCandidate>, n: usize) -> Vec<ScoredCandidate> {
    sort_by_rank(&mut scored);
    scored.truncate(n);
    scored
}

const SCORER_SYSTEM: &str =
    "You grade how well a passage answers a question. Reply with a single number from 0 to 10.";

/// Pointwise relevance grading by a generation model.
pub struct LlmReranker {
    generator: Arc<dyn TextGenerator>,
    concurrency: usize,
}

impl LlmReranker {
    pub fn new(generator: Arc<dyn TextGenerator>, concurrency: usize) -> Self {
        Self {
            generator,
            concurrency: concurrency.max(1),
        }
    }

    async fn score(&self, query: &str, cand: &ScoredCandidate) -> Result<f32, RerankError> {
        let prompt = format!(
            "Question:\n{}\n\nPassage:\n{}\n\nRelevance (0-10):",
            query.trim(),
            safe_truncate(cand.text.trim(), PASSAGE_CHARS)
        );
        let reply = self.generator.complete(&prompt, Some(SCORER_SYSTEM)).await?;
        parse_relevance(&reply)
    }
}

impl Reranker for LlmReranker {
    #[instrument(skip_all, fields(reranker = "llm", input = candidates.len(), n = n))]
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: Vec<ScoredCandidate>,
        n: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RerankError>> {
        Box::pin(async move {
            if candidates.is_empty() || n == 0 {
                return Ok(Vec::new());
            }
            let scored: Vec<ScoredCandidate> = stream::iter(candidates)
                .map(|mut c| async move {
                    c.score = self.score(query, &c).await?;
                    Ok::<_, RerankError>(c)
                })
                .buffer_unordered(self.concurrency)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect::<Result<_, _>>()?;
            debug!(scored = scored.len(), "llm rerank scored");
            Ok(finish(scored, n))
        })
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// First number in `reply`, clamped to 0..=10 and scaled to 0..=1.
pub(crate) fn parse_relevance(reply: &str) -> Result<f32, RerankError> {
    let start = reply
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| RerankError::Parse(rag_core::text::preview(reply, 40)))?;
    let num: String = reply[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f32 = num
        .trim_end_matches('.')
        .parse()
        .map_err(|_| RerankError::Parse(num.clone()))?;
    Ok(value.clamp(0.0, 10.0) / 10.0)
}

/// Cosine similarity under an embedding profile.
pub struct EmbeddingReranker {
    embedder: Arc<dyn EmbeddingsProvider>,
    concurrency: usize,
}

impl EmbeddingReranker {
    pub fn new(embedder: Arc<dyn EmbeddingsProvider>, concurrency: usize) -> Self {
        Self {
            embedder,
            concurrency: concurrency.max(1),
        }
    }
}

impl Reranker for EmbeddingReranker {
    #[instrument(skip_all, fields(reranker = "embedding", input = candidates.len(), n = n))]
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        mut candidates: Vec<ScoredCandidate>,
        n: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RerankError>> {
        Box::pin(async move {
            if candidates.is_empty() || n == 0 {
                return Ok(Vec::new());
            }
            let qv = self.embedder.embed(query).await?;
            let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
            let vectors = embed_texts(&texts, self.embedder.as_ref(), self.concurrency).await?;
            for (c, v) in candidates.iter_mut().zip(&vectors) {
                c.score = cosine(&qv, v);
            }
            Ok(finish(candidates, n))
        })
    }

    fn name(&self) -> &'static str {
        "embedding"
    }
}

/// Keeps candidates whose first-stage score reaches `threshold`.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdReranker {
    pub threshold: f32,
}

impl ThresholdReranker {
    pub fn apply(&self, candidates: Vec<ScoredCandidate>, n: usize) -> Vec<ScoredCandidate> {
        let kept = candidates
            .into_iter()
            .filter(|c| c.score >= self.threshold)
            .collect();
        finish(kept, n)
    }
}

impl Reranker for ThresholdReranker {
    fn rerank<'a>(
        &'a self,
        _query: &'a str,
        candidates: Vec<ScoredCandidate>,
        n: usize,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RerankError>> {
        let out = self.apply(candidates, n);
        Box::pin(async move { Ok(out) })
    }

    fn name(&self) -> &'static str {
        "threshold"
    }
}

/// Reranked candidates plus the reason the fallback ran, if it did.
#[derive(Clone, Debug, Serialize)]
pub struct RerankOutcome {
    pub candidates: Vec<ScoredCandidate>,
    pub degraded: Option<String>,
}

/// Primary reranker with a threshold fallback on failure.
#[derive(Clone)]
pub struct ResilientReranker {
    primary: Arc<dyn Reranker>,
    fallback: ThresholdReranker,
}

impl ResilientReranker {
    pub fn new(primary: Arc<dyn Reranker>, fallback: ThresholdReranker) -> Self {
        Self { primary, fallback }
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredCandidate>,
        n: usize,
    ) -> RerankOutcome {
        // The primary consumes its input, so keep a copy for the fallback.
        match self.primary.rerank(query, candidates.clone(), n).await {
            Ok(candidates) => RerankOutcome {
                candidates,
                degraded: None,
            },
            Err(e) => {
                warn!(
                    reranker = self.primary.name(),
                    error = %e,
                    threshold = self.fallback.threshold,
                    "primary reranker failed; using score threshold"
                );
                RerankOutcome {
                    candidates: self.fallback.apply(candidates, n),
                    degraded: Some(e.to_string()),
                }
            }
        }
    }
}
