//! Turn progress reporting.
//!
//! `TracingObserver` suits servers; `IndicatifObserver` draws a spinner for
//! interactive CLI use.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::api_types::Stage;

/// Receives stage transitions and tool invocations of one turn.
pub trait TurnObserver: Send + Sync {
    fn stage(&self, _stage: Stage) {}
    fn tool(&self, _name: &str) {}
    fn retry(&self, _stage: Stage, _reason: &str) {}
    fn finish(&self, _summary: &str) {}
}

/// Discards everything.
#[derive(Default, Clone, Copy)]
pub struct NoopObserver;
impl TurnObserver for NoopObserver {}

/// Emits each event as a `tracing` record.
#[derive(Default, Clone, Copy)]
pub struct TracingObserver;

impl TurnObserver for TracingObserver {
    fn stage(&self, stage: Stage) {
        info!(?stage, "turn stage");
    }
    fn tool(&self, name: &str) {
        info!(tool = name, "tool invoked");
    }
    fn retry(&self, stage: Stage, reason: &str) {
        info!(?stage, reason, "retrying stage");
    }
    fn finish(&self, summary: &str) {
        info!(summary, "turn finished");
    }
}

/// Spinner showing the current stage.
pub struct IndicatifObserver {
    pb: ProgressBar,
}

impl IndicatifObserver {
    pub fn spinner() -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .map(|s| s.tick_chars("-\\|/ "))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Self { pb }
    }
}

impl TurnObserver for IndicatifObserver {
    fn stage(&self, stage: Stage) {
        let label = match stage {
            Stage::Start => "planning",
            Stage::MetadataLookup => "looking up metadata",
            Stage::FilteredSearch => "searching candidates",
            Stage::Rerank => "reranking",
            Stage::Synthesize => "writing answer",
            Stage::Done => "done",
            Stage::Error => "failed",
        };
        self.pb.set_message(label);
    }
    fn tool(&self, name: &str) {
        self.pb.set_message(format!("tool: {name}"));
    }
    fn retry(&self, _stage: Stage, reason: &str) {
        self.pb.set_message(format!("retrying after: {reason}"));
    }
    fn finish(&self, summary: &str) {
        self.pb.finish_with_message(summary.to_string());
    }
}
