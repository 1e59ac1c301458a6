//! Errors raised by model capabilities (embedding, generation).

use std::time::Duration;

use ai_llm_service::AiLlmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The call exceeded its per-call deadline.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// Embedding length differs from the configured dimension.
    #[error("embedding dimension mismatch: got {got}, want {want}")]
    Dimension { got: usize, want: usize },

    /// Provider, transport or decode failure.
    #[error("upstream model error: {0}")]
    Upstream(String),
}

impl From<AiLlmError> for ServiceError {
    fn from(err: AiLlmError) -> Self {
        match err {
            AiLlmError::Timeout(d) => ServiceError::Timeout(d),
            other => ServiceError::Upstream(other.to_string()),
        }
    }
}
