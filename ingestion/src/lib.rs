//! Directory ingestion for filtered retrieval.
//!
//! A run walks a directory, extracts per-document metadata (front matter,
//! first heading, file date), optionally classifies documents, chunks and
//! embeds their text, upserts metadata rows and replaces each document's
//! chunk vectors, then recomputes clusters over document vectors.

pub mod classify;
pub mod cluster;
mod config;
mod errors;
pub mod loader;
mod pipeline;

pub use classify::Category;
pub use config::IngestConfig;
pub use errors::IngestError;
pub use loader::{LoadedDocument, ScanResult, scan_dir};
pub use pipeline::{IngestReport, IngestionPipeline};
