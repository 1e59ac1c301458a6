//! Text generation capability.

use std::sync::Arc;

use ai_llm_service::{LlmServiceProfiles, ModelRole};

use crate::{BoxFuture, errors::ServiceError};

/// Single-turn completion service.
pub trait TextGenerator: Send + Sync {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;
}

/// Generator bound to one role of [`LlmServiceProfiles`].
#[derive(Clone)]
pub struct ProfileGenerator {
    svc: Arc<LlmServiceProfiles>,
    role: ModelRole,
}

impl ProfileGenerator {
    pub fn new(svc: Arc<LlmServiceProfiles>, role: ModelRole) -> Self {
        Self { svc, role }
    }
}

impl TextGenerator for ProfileGenerator {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        Box::pin(async move { Ok(self.svc.generate(self.role, prompt, system).await?) })
    }
}
