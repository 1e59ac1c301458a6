//! Embedding capability.

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use tracing::{debug, instrument};

use crate::{BoxFuture, errors::ServiceError};

/// Asynchronous embedding provider.
///
/// Implement this trait to plug in your own embedding backend.
pub trait EmbeddingsProvider: Send + Sync {
    /// Produces an embedding vector for the given text.
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ServiceError>>;

    /// Dimension every returned vector must have.
    fn dimension(&self) -> usize;
}

/// Embedder backed by the embedding profile of [`LlmServiceProfiles`].
#[derive(Clone)]
pub struct ProfileEmbedder {
    svc: Arc<LlmServiceProfiles>,
    dim: usize,
}

impl ProfileEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: usize) -> Self {
        Self { svc, dim }
    }

    /// Embeds a fixed probe string and checks the returned dimension.
    ///
    /// Used at startup so a model/dimension mismatch stops the process
    /// before any request is served.
    #[instrument(skip(self), fields(want = self.dim))]
    pub async fn probe(&self) -> Result<(), ServiceError> {
        let v = self.embed("dimension probe").await?;
        debug!(got = v.len(), "embedding probe ok");
        Ok(())
    }
}

impl EmbeddingsProvider for ProfileEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ServiceError>> {
        Box::pin(async move {
            let v = self.svc.embed(text).await?;
            check_dimension(v, self.dim)
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

fn check_dimension(v: Vec<f32>, want: usize) -> Result<Vec<f32>, ServiceError> {
    if v.len() != want {
        return Err(ServiceError::Dimension { got: v.len(), want });
    }
    Ok(v)
}

/// Cosine similarity; `0.0` when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn wrong_dimension_is_typed_error() {
        assert_eq!(check_dimension(vec![0.0; 4], 4).unwrap().len(), 4);
        assert!(matches!(
            check_dimension(vec![0.0; 3], 4),
            Err(ServiceError::Dimension { got: 3, want: 4 })
        ));
    }
}
