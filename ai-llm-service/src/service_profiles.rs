//! Shared LLM service with three role profiles: `synthesis`, `auxiliary`, `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (provider+endpoint+model+key+timeout).
//! - Every call is bounded by the profile's `timeout_secs`; expiry yields
//!   [`AiLlmError::Timeout`] and drops the in-flight request.
//! - If the `auxiliary` profile is not provided, it falls back to `synthesis`.

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};

use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, ProviderError, ProviderErrorKind},
    health_service::{HealthService, HealthStatus},
    services::{anthropic_service::AnthropicService, ollama_service::OllamaService},
};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Which profile a call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    /// Final answer composition.
    Synthesis,
    /// Planning, reranking, classification, cluster naming.
    Auxiliary,
}

/// Shared service managing the synthesis, auxiliary and embedding profiles.
pub struct LlmServiceProfiles {
    synthesis: LlmModelConfig,
    auxiliary: LlmModelConfig,
    embedding: LlmModelConfig,

    ollama: RwLock<HashMap<ClientKey, Arc<OllamaService>>>,
    anthropic: RwLock<HashMap<ClientKey, Arc<AnthropicService>>>,

    health: HealthService,
}

impl LlmServiceProfiles {
    /// Creates a new service with three profiles.
    ///
    /// - `synthesis`: required answer-composition profile.
    /// - `auxiliary_opt`: optional cheaper profile. If `None`, falls back to `synthesis`.
    /// - `embedding`: required embedding profile; its provider must support embeddings.
    /// - `health_timeout_secs`: optional timeout for the health checker.
    ///
    /// # Errors
    /// Returns [`AiLlmError::Config`] when a profile fails validation, or a
    /// provider error if the embedding profile targets a provider without embeddings.
    pub fn new(
        synthesis: LlmModelConfig,
        auxiliary_opt: Option<LlmModelConfig>,
        embedding: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        let auxiliary = auxiliary_opt.unwrap_or_else(|| synthesis.clone());

        synthesis.validate()?;
        auxiliary.validate()?;
        embedding.validate()?;
        if !embedding.provider.supports_embeddings() {
            return Err(ProviderError::new(
                embedding.provider,
                ProviderErrorKind::Unsupported("embeddings"),
            )
            .into());
        }

        Ok(Self {
            synthesis,
            auxiliary,
            embedding,
            ollama: RwLock::new(HashMap::new()),
            anthropic: RwLock::new(HashMap::new()),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Generates text with the profile for `role`.
    ///
    /// # Errors
    /// Returns [`AiLlmError::Timeout`] if the profile timeout elapses, or the
    /// provider/transport error otherwise.
    pub async fn generate(
        &self,
        role: ModelRole,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, AiLlmError> {
        let cfg = match role {
            ModelRole::Synthesis => &self.synthesis,
            ModelRole::Auxiliary => &self.auxiliary,
        };
        debug!(?role, model = %cfg.model, "generate");
        with_deadline(cfg, self.generate_with(cfg, prompt, system)).await
    }

    /// Computes an embedding with the **embedding** profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let cfg = &self.embedding;
        with_deadline(cfg, async {
            let cli = self.get_or_init_ollama(cfg).await?;
            cli.embeddings(input).await
        })
        .await
    }

    /// Returns a health snapshot for all distinct profiles.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = Vec::<LlmModelConfig>::with_capacity(3);
        list.push(self.synthesis.clone());
        if self.auxiliary != self.synthesis {
            list.push(self.auxiliary.clone());
        }
        if self.embedding != self.synthesis && self.embedding != self.auxiliary {
            list.push(self.embedding.clone());
        }
        self.health.check_many(&list).await
    }

    /// Returns references to the current profiles `(synthesis, auxiliary, embedding)`.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig, &LlmModelConfig) {
        (&self.synthesis, &self.auxiliary, &self.embedding)
    }

    /* --------------------- Internals --------------------- */

    async fn generate_with(
        &self,
        cfg: &LlmModelConfig,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, AiLlmError> {
        match cfg.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(cfg).await?;
                cli.generate(prompt, system).await
            }
            LlmProvider::Anthropic => {
                let cli = self.get_or_init_anthropic(cfg).await?;
                cli.generate(prompt, system).await
            }
        }
    }

    async fn get_or_init_ollama(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OllamaService>, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.ollama.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(OllamaService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }

    async fn get_or_init_anthropic(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<AnthropicService>, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.anthropic.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.anthropic.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(AnthropicService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

async fn with_deadline<T>(
    cfg: &LlmModelConfig,
    fut: impl Future<Output = Result<T, AiLlmError>>,
) -> Result<T, AiLlmError> {
    let limit = cfg
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CALL_TIMEOUT);
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AiLlmError::Timeout(limit))?
}

/// Internal cache key to identify unique client configs.
#[derive(Clone, PartialEq, Eq)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

impl Hash for ClientKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.endpoint.hash(state);
        self.model.hash(state);
        self.api_key.hash(state);
        self.timeout.hash(state);
    }
}
