//! Errors raised while configuring or calling model providers.
//!
//! [`AiLlmError`] is what every public call returns. Profile validation
//! failures live in [`ConfigError`], probe failures in [`HealthError`] and
//! failed generate/embed calls in [`ProviderError`].

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::llm_provider::LlmProvider;

/* ------------------------------------------------------------------------- */
/* Result alias                                                              */
/* ------------------------------------------------------------------------- */

pub type Result<T> = std::result::Result<T, AiLlmError>;

/* ------------------------------------------------------------------------- */
/* AiLlmError                                                                */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// A model profile is unusable; raised at startup.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Connection refused, reset, DNS failure and similar.
    #[error("model endpoint unreachable: {0}")]
    HttpTransport(#[from] reqwest::Error),

    #[error("model call exceeded {0:?}")]
    Timeout(Duration),
}

impl AiLlmError {
    /// True for failures worth one retry (transport hiccups, 5xx, timeouts).
    pub fn is_transient(&self) -> bool {
        match self {
            AiLlmError::Timeout(_) => true,
            AiLlmError::HttpTransport(e) => e.is_timeout() || e.is_connect(),
            AiLlmError::Provider(ProviderError {
                kind: ProviderErrorKind::HttpStatus(http),
                ..
            }) => http.status.is_server_error(),
            _ => false,
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Profile validation                                                        */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider needs a secret that only the environment may supply.
    #[error("{0} is not set; provide it through the environment")]
    MissingSecret(&'static str),

    #[error("unknown model provider {0:?} (expected ollama or anthropic)")]
    UnsupportedProvider(String),

    #[error("{field}: {reason}")]
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },

    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("model name is empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Provider call failures                                                    */
/* ------------------------------------------------------------------------- */

/// Non-2xx response details.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub url: String,
    pub snippet: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} from {}: {}", self.status, self.url, self.snippet)
    }
}

#[derive(Debug)]
pub enum ProviderErrorKind {
    InvalidProvider,
    InvalidEndpoint(String),
    MissingApiKey,
    HttpStatus(HttpError),
    Decode(String),
    /// The provider has no such operation (e.g. embeddings on Anthropic).
    Unsupported(&'static str),
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::InvalidProvider => f.write_str("config targets a different provider"),
            ProviderErrorKind::InvalidEndpoint(e) => write!(f, "invalid endpoint: {e}"),
            ProviderErrorKind::MissingApiKey => f.write_str("missing API key"),
            ProviderErrorKind::HttpStatus(h) => write!(f, "{h}"),
            ProviderErrorKind::Decode(m) => write!(f, "failed to decode response: {m}"),
            ProviderErrorKind::Unsupported(op) => write!(f, "operation not supported: {op}"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{provider}: {kind}")]
pub struct ProviderError {
    pub provider: LlmProvider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: LlmProvider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

/* ------------------------------------------------------------------------- */
/* Health probes                                                             */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("health probe failed: {0}")]
    HttpStatus(HttpError),

    #[error("unexpected health payload: {0}")]
    Decode(String),
}

/// Trims a response body to a short single-line snippet for logs and errors.
pub fn make_snippet(body: &str) -> String {
    body.chars()
        .take(240)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

/* ------------------------------------------------------------------------- */
/* Validation helpers                                                        */
/* ------------------------------------------------------------------------- */

pub fn validate_http_endpoint(field: &'static str, value: &str) -> Result<()> {
    match value.split_once("://") {
        Some(("http" | "https", host)) if !host.is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidFormat {
            field,
            reason: "expected an http:// or https:// URL",
        }
        .into()),
    }
}

pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if (min..=max).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        field,
        value,
        min,
        max,
    }
    .into())
}
