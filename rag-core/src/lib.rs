//! Shared building blocks for the filtered RAG pipeline.
//!
//! - [`ids`]: content-independent document ids and vector point ids
//! - [`types`]: documents, clusters, candidate id sets, scored candidates
//! - [`embed`] / [`generate`]: async model capabilities and their adapters over
//!   [`ai_llm_service::LlmServiceProfiles`]
//! - [`text`]: normalization and chunking
//!
//! With the `test-support` feature, [`testing`] exposes offline fakes.

pub mod embed;
pub mod errors;
pub mod generate;
pub mod ids;
pub mod text;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use embed::{EmbeddingsProvider, ProfileEmbedder};
pub use errors::ServiceError;
pub use generate::{ProfileGenerator, TextGenerator};
pub use ids::{DocumentId, point_id};
pub use types::{CandidateIdSet, Cluster, Document, ScoredCandidate, sort_by_rank};

use std::{future::Future, pin::Pin};

/// Boxed, sendable future returned by the capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
