use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error_handler::ConfigError;

/// Backend used for inference or embeddings.
///
/// Ollama serves both generation and embeddings; Anthropic only serves
/// generation, so an embedding profile must stay on Ollama.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local or remote Ollama runtime.
    Ollama,
    /// Anthropic Messages API.
    Anthropic,
}

impl LlmProvider {
    /// Whether the provider exposes an embeddings endpoint.
    pub fn supports_embeddings(self) -> bool {
        matches!(self, LlmProvider::Ollama)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Ollama => f.write_str("ollama"),
            LlmProvider::Anthropic => f.write_str("anthropic"),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}
