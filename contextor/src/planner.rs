//! Tool selection for a turn: answer directly or retrieve through the metadata filter.

use std::sync::Arc;

use metadata_store::MetadataQuery;
use rag_core::{BoxFuture, TextGenerator};
use serde::Deserialize;
use tracing::{debug, warn};

/// What the orchestrator should do with a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Plan {
    /// Synthesize without any retrieval.
    Direct,
    /// Run metadata lookup with `filter`, then constrained search.
    Retrieve { filter: MetadataQuery },
}

impl Plan {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Plan::Direct => "direct_answer",
            Plan::Retrieve { .. } => "metadata_filtered_search",
        }
    }
}

/// Strategy deciding the [`Plan`] for a query.
pub trait ToolPlanner: Send + Sync {
    fn plan<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Plan>;

    fn name(&self) -> &'static str;
}

/// Retrieves whenever the parsed query carries a criterion or a limit.
#[derive(Clone, Copy, Debug, Default)]
pub struct RulePlanner;

impl RulePlanner {
    pub fn decide(&self, query: &str) -> Plan {
        let filter = MetadataQuery::parse(query);
        if filter.has_criteria() || filter.limit.is_some() {
            Plan::Retrieve { filter }
        } else {
            Plan::Direct
        }
    }
}

impl ToolPlanner for RulePlanner {
    fn plan<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Plan> {
        let plan = self.decide(query);
        Box::pin(async move { plan })
    }

    fn name(&self) -> &'static str {
        "rule"
    }
}

const PLANNER_SYSTEM: &str = "You route questions for a document assistant. \
Reply with one JSON object and nothing else.";

#[derive(Debug, Deserialize)]
struct ToolDecision {
    tool: String,
    #[serde(default)]
    filter: Option<String>,
}

/// Asks the auxiliary model for a JSON tool decision.
///
/// Malformed output or a failed call falls back to [`RulePlanner`].
pub struct LlmPlanner {
    generator: Arc<dyn TextGenerator>,
    fallback: RulePlanner,
}

impl LlmPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            fallback: RulePlanner,
        }
    }

    fn prompt(query: &str) -> String {
        format!(
            "Decide whether answering needs the user's document collection.\n\
             Output {{\"tool\":\"retrieve\",\"filter\":\"<criteria>\"}} or {{\"tool\":\"direct\"}}.\n\
             Criteria may use topic words, jurisdiction:<tag>, after:YYYY-MM-DD, \
             before:YYYY-MM-DD, cluster:<name> and \"N most recent\".\n\n\
             Question: {query}"
        )
    }
}

impl ToolPlanner for LlmPlanner {
    fn plan<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Plan> {
        Box::pin(async move {
            let raw = match self
                .generator
                .complete(&Self::prompt(query), Some(PLANNER_SYSTEM))
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "planner model failed; using rule planner");
                    return self.fallback.decide(query);
                }
            };

            match parse_decision(&raw, query) {
                Some(plan) => {
                    debug!(tool = plan.tool_name(), "llm planner decision");
                    plan
                }
                None => {
                    warn!(raw = %rag_core::text::preview(&raw, 120), "malformed planner output; using rule planner");
                    self.fallback.decide(query)
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Reads the first `{...}` object in `raw` as a tool decision.
fn parse_decision(raw: &str, query: &str) -> Option<Plan> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let decision: ToolDecision = serde_json::from_str(&raw[start..=end]).ok()?;
    match decision.tool.trim().to_ascii_lowercase().as_str() {
        "direct" => Some(Plan::Direct),
        "retrieve" => {
            let text = decision
                .filter
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| query.to_string());
            Some(Plan::Retrieve {
                filter: MetadataQuery::parse(&text),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::testing::ScriptedGenerator;

    #[test]
    fn rule_planner_retrieves_on_criteria() {
        let plan = RulePlanner.decide("summarize documents about asbestos");
        match plan {
            Plan::Retrieve { filter } => assert_eq!(filter.topic_terms, vec!["summarize", "asbestos"]),
            Plan::Direct => panic!("expected retrieval"),
        }
        assert_eq!(RulePlanner.decide("hello, how are you?"), Plan::Direct);
    }

    #[tokio::test]
    async fn llm_planner_reads_json_inside_prose() {
        let g = Arc::new(ScriptedGenerator::always(
            "Sure! {\"tool\":\"retrieve\",\"filter\":\"jurisdiction:contract-law\"} hope that helps",
        ));
        let plan = LlmPlanner::new(g).plan("anything").await;
        match plan {
            Plan::Retrieve { filter } => {
                assert_eq!(filter.jurisdiction.as_deref(), Some("contract-law"))
            }
            Plan::Direct => panic!("expected retrieval"),
        }
    }

    #[tokio::test]
    async fn llm_planner_falls_back_on_garbage() {
        let g = Arc::new(ScriptedGenerator::always("I would search, probably"));
        let planner = LlmPlanner::new(g.clone());
        assert_eq!(planner.plan("hey there").await, Plan::Direct);
        assert!(matches!(
            planner.plan("latest 3 asbestos rulings").await,
            Plan::Retrieve { .. }
        ));
        assert_eq!(g.calls(), 2);
    }

    #[tokio::test]
    async fn llm_planner_falls_back_on_model_error() {
        let g = Arc::new(ScriptedGenerator::always("{}").with_queue(vec![Err("down".into())]));
        let plan = LlmPlanner::new(g).plan("asbestos rulings").await;
        assert!(matches!(plan, Plan::Retrieve { .. }));
    }
}
