//! Turn configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::TurnError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerKind {
    /// Deterministic: retrieve whenever the query carries filter criteria.
    Rule,
    /// Ask the auxiliary model, falling back to the rule planner.
    Llm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankerKind {
    /// Pointwise 0-10 relevance scores from the auxiliary model.
    Llm,
    /// Cosine similarity under the embedding profile.
    Embedding,
}

/// Knobs for one orchestrator turn. All fields have defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// `top_k` of filtered search.
    pub retrieval_width: u64,
    /// Candidates kept after reranking.
    pub rerank_top_n: usize,
    /// Minimum original score kept by the degraded fallback reranker.
    pub fallback_score_threshold: f32,
    pub turn_timeout_secs: u64,
    pub planner: PlannerKind,
    pub reranker: RerankerKind,
    /// Concurrent model calls while reranking.
    pub rerank_concurrency: usize,
    /// Character budget of the context block in the synthesis prompt.
    pub max_ctx_chars: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            retrieval_width: 50,
            rerank_top_n: 5,
            fallback_score_threshold: 0.3,
            turn_timeout_secs: 120,
            planner: PlannerKind::Rule,
            reranker: RerankerKind::Llm,
            rerank_concurrency: 4,
            max_ctx_chars: 8500,
        }
    }
}

impl TurnConfig {
    pub fn validate(&self) -> Result<(), TurnError> {
        if self.retrieval_width == 0 {
            return Err(TurnError::Configuration("retrieval_width must be > 0".into()));
        }
        if self.rerank_top_n == 0 {
            return Err(TurnError::Configuration("rerank_top_n must be > 0".into()));
        }
        if self.turn_timeout_secs == 0 {
            return Err(TurnError::Configuration("turn_timeout_secs must be > 0".into()));
        }
        if !self.fallback_score_threshold.is_finite() {
            return Err(TurnError::Configuration(
                "fallback_score_threshold must be finite".into(),
            ));
        }
        Ok(())
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = TurnConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.retrieval_width, 50);
        assert_eq!(cfg.rerank_top_n, 5);
    }

    #[test]
    fn deserializes_partial_toml_like_json() {
        let cfg: TurnConfig =
            serde_json::from_str(r#"{"planner":"llm","rerank_top_n":3}"#).unwrap();
        assert_eq!(cfg.planner, PlannerKind::Llm);
        assert_eq!(cfg.rerank_top_n, 3);
        assert_eq!(cfg.retrieval_width, 50);
    }
}
