//! Offline fakes for tests across the workspace.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{BoxFuture, EmbeddingsProvider, ServiceError, TextGenerator};

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed into one of `dim` buckets and
/// the result is L2-normalized, so texts sharing words have high cosine.
pub struct HashingEmbedder {
    dim: usize,
    calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for tok in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let tok = tok.to_lowercase();
            let h = blake3::hash(tok.as_bytes());
            let bytes = h.as_bytes();
            let idx = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dim;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl EmbeddingsProvider for HashingEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ServiceError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let v = self.vector(text);
        Box::pin(async move { Ok(v) })
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder {
    pub dim: usize,
}

impl EmbeddingsProvider for FailingEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, ServiceError>> {
        Box::pin(async { Err(ServiceError::Upstream("embedder offline".into())) })
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Generator replaying queued replies, then a fallback reply.
///
/// Counts calls and can sleep before answering to exercise deadlines.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.into(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queues replies; `Err` entries surface as [`ServiceError::Upstream`].
    pub fn with_queue(mut self, replies: Vec<Result<String, String>>) -> Self {
        self.replies = Mutex::new(replies.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for ScriptedGenerator {
    fn complete<'a>(
        &'a self,
        _prompt: &'a str,
        _system: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        let delay = self.delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            next.map_err(ServiceError::Upstream)
        })
    }
}

/// Generator whose reply is computed from the prompt.
pub struct FnGenerator<F>(pub F);

impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&str) -> Result<String, ServiceError> + Send + Sync,
{
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        _system: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        let out = (self.0)(prompt);
        Box::pin(async move { out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::cosine;

    #[tokio::test]
    async fn hashing_embedder_is_deterministic_and_counts() {
        let e = HashingEmbedder::new(64);
        let a = e.embed("Asbestos liability").await.unwrap();
        let b = e.embed("asbestos LIABILITY").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(e.calls(), 2);
        let c = e.embed("unrelated gardening tips").await.unwrap();
        assert!(cosine(&a, &b) > cosine(&a, &c));
    }

    #[tokio::test]
    async fn scripted_generator_replays_then_falls_back() {
        let g = ScriptedGenerator::always("done").with_queue(vec![Err("boom".into())]);
        assert!(g.complete("p", None).await.is_err());
        assert_eq!(g.complete("p", None).await.unwrap(), "done");
        assert_eq!(g.calls(), 2);
    }
}
