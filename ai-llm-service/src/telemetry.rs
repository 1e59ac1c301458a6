use std::io::{self, IsTerminal};
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Workspace crate targets; events from other crates (hyper, h2, ...) are
/// left to the global filter.
pub const PIPELINE_TARGETS: &[&str] = &[
    "ai_llm_service",
    "rag_core",
    "metadata_store",
    "rag_store",
    "contextor",
    "ingestion",
    "api",
    "filtered_rag",
];

/// RFC3339 UTC timer implemented via `chrono`.
/// Example output: `2025-09-12T10:20:30Z`
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        let s = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Compact formatting layer for the pipeline binaries.
///
/// - RFC3339 UTC timestamps
/// - `file:line` and target (module path)
/// - span close events, so `#[instrument]`ed external calls log their duration
/// - ANSI colors only when stdout is a terminal
pub fn layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stdout().is_terminal();

    fmt::layer()
        .with_timer(ChronoRfc3339Utc)
        .with_level(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(use_ansi)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(fmt::format().compact().with_source_location(true))
}

/// Builds `target=level` directives for every workspace crate.
pub fn level_directives(level: Level) -> Vec<Directive> {
    let lvl = level.as_str().to_lowercase();
    PIPELINE_TARGETS
        .iter()
        .filter_map(|t| Directive::from_str(&format!("{t}={lvl}")).ok())
        .collect()
}

/// `RUST_LOG` if set, otherwise `default`, with `level` applied to the
/// pipeline crates.
///
/// Example: `default = "warn"`, `level = Level::INFO` shows only warnings from
/// dependencies and INFO from the pipeline.
pub fn env_filter_with_level(default: &str, level: Level) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    level_directives(level)
        .into_iter()
        .fold(EnvFilter::new(default), |f, d| f.add_directive(d))
}
