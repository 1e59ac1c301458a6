//! Application configuration: defaults, then an optional TOML file, then env.
//!
//! Secrets (`ANTHROPIC_API_KEY`, `QDRANT_API_KEY`) are only read from the
//! environment; keys found in the file are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use ai_llm_service::{LlmModelConfig, LlmProvider};
use contextor::TurnConfig;
use ingestion::IngestConfig;
use metadata_store::MetadataStoreConfig;
use rag_store::{BackendKind, RagConfig};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "FILTERED_RAG_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub synthesis: LlmModelConfig,
    /// Falls back to `synthesis` when absent.
    pub auxiliary: Option<LlmModelConfig>,
    pub embedding: LlmModelConfig,
    pub health_timeout_secs: Option<u64>,
}

fn ollama_profile(model: &str, temperature: Option<f32>) -> LlmModelConfig {
    LlmModelConfig {
        provider: LlmProvider::Ollama,
        model: model.into(),
        endpoint: "http://localhost:11434".into(),
        api_key: None,
        max_tokens: None,
        temperature,
        top_p: None,
        timeout_secs: Some(60),
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            synthesis: ollama_profile("qwen2.5:7b", Some(0.1)),
            auxiliary: None,
            embedding: ollama_profile("nomic-embed-text:latest", None),
            health_timeout_secs: Some(5),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: Option<String>,
    /// Default directory for `POST /ingest` and `ingest` without a path.
    pub ingest_root: Option<PathBuf>,
}

impl ServerConfig {
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or("127.0.0.1:8080")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub metadata: MetadataStoreConfig,
    pub vectors: RagConfig,
    pub turn: TurnConfig,
    pub ingest: IngestConfig,
}

impl AppConfig {
    /// Reads `path` (or `$FILTERED_RAG_CONFIG`) when given, then applies the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let mut cfg: Self = toml::from_str(text)?;
        cfg.strip_file_secrets();
        Ok(cfg)
    }

    fn strip_file_secrets(&mut self) {
        self.vectors.qdrant_api_key = None;
        for p in self.profiles_mut() {
            p.api_key = None;
        }
    }

    fn profiles_mut(&mut self) -> impl Iterator<Item = &mut LlmModelConfig> {
        let m = &mut self.models;
        [Some(&mut m.synthesis), m.auxiliary.as_mut(), Some(&mut m.embedding)]
            .into_iter()
            .flatten()
    }

    /// Overrides from environment variables looked up through `get`.
    pub fn apply_env<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get("OLLAMA_URL") {
            for p in self.profiles_mut() {
                if p.provider == LlmProvider::Ollama {
                    p.endpoint = url.clone();
                }
            }
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            for p in self.profiles_mut() {
                if p.provider == LlmProvider::Anthropic {
                    p.api_key = Some(key.clone());
                }
            }
        }
        if let Some(m) = get("SYNTHESIS_MODEL") {
            self.models.synthesis.model = m;
        }
        if let Some(m) = get("AUXILIARY_MODEL") {
            let mut aux = self
                .models
                .auxiliary
                .clone()
                .unwrap_or_else(|| self.models.synthesis.clone());
            aux.model = m;
            self.models.auxiliary = Some(aux);
        }
        if let Some(m) = get("EMBEDDING_MODEL") {
            self.models.embedding.model = m;
        }

        if let Some(v) = get("VECTOR_BACKEND") {
            self.vectors.backend = match v.to_ascii_lowercase().as_str() {
                "qdrant" => BackendKind::Qdrant,
                "memory" => BackendKind::Memory,
                _ => return Err(ConfigError::Env { var: "VECTOR_BACKEND", value: v }),
            };
        }
        if let Some(v) = get("QDRANT_URL") {
            self.vectors.qdrant_url = v;
        }
        if let Some(v) = get("QDRANT_API_KEY") {
            self.vectors.qdrant_api_key = Some(v);
        }
        if let Some(v) = get("QDRANT_COLLECTION") {
            self.vectors.collection = v;
        }
        if let Some(v) = get("EMBEDDING_DIM") {
            self.vectors.embedding_dim = parse_num("EMBEDDING_DIM", v)?;
        }
        if let Some(v) = get("METADATA_DB_PATH") {
            self.metadata.path = PathBuf::from(v);
        }
        if let Some(v) = get("TURN_TIMEOUT_SECS") {
            self.turn.turn_timeout_secs = parse_num("TURN_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = get("API_ADDRESS") {
            self.server.address = Some(v);
        }
        if let Some(v) = get("INGEST_ROOT") {
            self.server.ingest_root = Some(PathBuf::from(v));
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
