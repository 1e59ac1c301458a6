//! Anthropic Messages API client for text generation.
//!
//! - `POST {endpoint}/v1/messages`: single non-streaming completion
//!
//! Constructor validation:
//! - `cfg.provider` must be `LlmProvider::Anthropic`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://
//!
//! Anthropic has no embeddings endpoint; use an Ollama embedding profile.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
use crate::error_handler::{
    AiLlmError, HttpError, ProviderError, ProviderErrorKind, Result, make_snippet,
};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Thin client for the Anthropic API.
#[derive(Debug)]
pub struct AnthropicService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_messages: String,
}

impl AnthropicService {
    /// Creates a new [`AnthropicService`] from the given config.
    pub fn new(cfg: LlmModelConfig) -> Result<Self> {
        if cfg.provider != LlmProvider::Anthropic {
            return Err(provider_error(ProviderErrorKind::InvalidProvider));
        }

        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| provider_error(ProviderErrorKind::MissingApiKey))?;

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(provider_error(ProviderErrorKind::InvalidEndpoint(
                cfg.endpoint.clone(),
            )));
        }

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            header::HeaderValue::from_str(&api_key).map_err(|e| {
                provider_error(ProviderErrorKind::Decode(format!(
                    "invalid API key header: {e}"
                )))
            })?,
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(API_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let url_messages = format!("{}/v1/messages", endpoint.trim_end_matches('/'));

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            "AnthropicService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_messages,
        })
    }

    /// Single-turn completion; concatenates all `text` content blocks.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let started = Instant::now();
        let body = MessagesRequest {
            model: &self.cfg.model,
            max_tokens: self.cfg.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature: self.cfg.temperature,
            top_p: self.cfg.top_p,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("POST {}", self.url_messages);
        let resp = self
            .client
            .post(&self.url_messages)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(%status, %snippet, "anthropic messages call failed");
            return Err(provider_error(ProviderErrorKind::HttpStatus(HttpError {
                status,
                url: self.url_messages.clone(),
                snippet,
            })));
        }

        let out: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| provider_error(ProviderErrorKind::Decode(e.to_string())))?;

        let text = out
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "anthropic completion received"
        );

        if text.is_empty() {
            return Err(provider_error(ProviderErrorKind::Decode(
                "response contained no text blocks".into(),
            )));
        }
        Ok(text)
    }
}

fn provider_error(kind: ProviderErrorKind) -> AiLlmError {
    ProviderError::new(LlmProvider::Anthropic, kind).into()
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(key: Option<&str>) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Anthropic,
            model: "claude-3-opus-20240229".into(),
            endpoint: "https://api.anthropic.com".into(),
            api_key: key.map(str::to_string),
            max_tokens: None,
            temperature: Some(0.1),
            top_p: None,
            timeout_secs: Some(30),
        }
    }

    #[test]
    fn requires_api_key() {
        assert!(AnthropicService::new(cfg(None)).is_err());
        assert!(AnthropicService::new(cfg(Some("sk-test"))).is_ok());
    }

    #[test]
    fn decodes_text_blocks() {
        let raw = r#"{"content":[{"type":"text","text":"Hello"},{"type":"tool_use"},{"type":"text","text":" world"}]}"#;
        let out: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text: String = out
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        assert_eq!(text, "Hello world");
    }
}
