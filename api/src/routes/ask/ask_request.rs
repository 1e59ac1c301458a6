use contextor::{TurnOutcome, TurnTrace, UsedChunk};
use serde::{Deserialize, Serialize};

/// Request payload for `POST /ask`.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Natural language question, optionally with filter tokens.
    pub question: String,
    /// Optional per-request turn deadline.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Response payload for `POST /ask`.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub outcome: TurnOutcome,
    /// Chunks that were given to the model, most relevant first.
    pub context: Vec<UsedChunk>,
    pub trace: TurnTrace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_rerank: Option<String>,
}
