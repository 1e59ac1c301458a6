//! Shared LLM access for the filtered RAG pipeline.
//!
//! - [`config`]: provider/model configuration and env-driven defaults.
//! - [`services`]: thin provider clients (Ollama, Anthropic).
//! - [`service_profiles`]: role-based profiles (synthesis, auxiliary, embedding).
//! - [`health_service`]: best-effort provider probes for `/health`.
//! - [`telemetry`]: library-scoped tracing layer.

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::{AiLlmError, Result};
pub use service_profiles::{LlmServiceProfiles, ModelRole};
