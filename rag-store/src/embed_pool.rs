//! Embedding executor with concurrency and dimension checks.

use futures::stream::{self, StreamExt};
use rag_core::EmbeddingsProvider;
use tracing::{debug, info};

use crate::errors::RagError;

/// Embeds `texts` with at most `concurrency` requests in flight.
///
/// Output order matches input order. Every vector must have the provider's
/// dimension.
///
/// # Errors
/// Returns [`RagError::VectorSizeMismatch`] if dimensions mismatch,
/// or [`RagError::Embedding`] if the provider fails.
pub async fn embed_texts(
    texts: &[String],
    provider: &dyn EmbeddingsProvider,
    concurrency: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    info!(
        total = texts.len(),
        concurrency, "embed_pool::embed_texts"
    );
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let want = provider.dimension();
    let mut results: Vec<(usize, Vec<f32>)> = stream::iter(0..texts.len())
        .map(|i| async move {
            let text = &texts[i];
            let v = provider.embed(text).await?;
            Ok::<(usize, Vec<f32>), RagError>((i, v))
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>, RagError>>()?;

    if let Some((_, bad)) = results.iter().find(|(_, v)| v.len() != want) {
        return Err(RagError::VectorSizeMismatch {
            got: bad.len(),
            want,
        });
    }

    results.sort_by_key(|(i, _)| *i);
    debug!("embed_pool::embed_texts: embeddings filled");
    Ok(results.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::testing::{FailingEmbedder, HashingEmbedder};

    #[tokio::test]
    async fn keeps_input_order() {
        let e = HashingEmbedder::new(16);
        let texts: Vec<String> = (0..10).map(|i| format!("text number {i}")).collect();
        let out = embed_texts(&texts, &e, 3).await.unwrap();
        assert_eq!(out.len(), 10);
        for (t, v) in texts.iter().zip(&out) {
            assert_eq!(v, &e.vector(t));
        }
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let e = FailingEmbedder { dim: 4 };
        let err = embed_texts(&["x".to_string()], &e, 1).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }
}
