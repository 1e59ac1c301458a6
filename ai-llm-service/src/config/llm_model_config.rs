use serde::{Deserialize, Serialize};

use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{ConfigError, Result, validate_http_endpoint, validate_range_f32};

/// Configuration for one model invocation profile.
///
/// # Fields
///
/// - `provider`: backend serving the model.
/// - `model`: model identifier (e.g. `"qwen2.5:7b"`, `"nomic-embed-text"`).
/// - `endpoint`: base URL of the provider.
/// - `api_key`: secret for providers that need one; never read from a config file
///   that is checked in, only from env.
/// - `max_tokens`, `temperature`, `top_p`: sampling options.
/// - `timeout_secs`: per-call deadline; a call that exceeds it fails with
///   [`crate::AiLlmError::Timeout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmModelConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Checks model name, endpoint scheme, sampling ranges and credentials.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("endpoint", self.endpoint.trim())?;
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        if let Some(p) = self.top_p {
            validate_range_f32("top_p", p, 0.0, 1.0)?;
        }
        if self.provider == LlmProvider::Anthropic
            && self.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(ConfigError::MissingSecret("ANTHROPIC_API_KEY").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "qwen2.5:7b".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            max_tokens: None,
            temperature: Some(0.1),
            top_p: None,
            timeout_secs: Some(30),
        }
    }

    #[test]
    fn accepts_valid_ollama_profile() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_anthropic_without_key() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::Anthropic,
            endpoint: "https://api.anthropic.com".into(),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let cfg = LlmModelConfig {
            temperature: Some(3.5),
            ..base()
        };
        assert!(cfg.validate().is_err());
    }
}
