//! Directory scan and per-file metadata extraction.
//!
//! Files may open with a front-matter block delimited by `---` lines holding
//! `key: value` pairs. `topic`, `date`, `jurisdiction` (or `category`) and
//! `title` are recognized; everything else is ignored.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::IngestConfig;
use crate::errors::IngestError;

const TITLE_MAX_CHARS: usize = 120;

/// A decoded file with the metadata found in it.
#[derive(Clone, Debug)]
pub struct LoadedDocument {
    /// Absolute path under the canonicalized scan root.
    pub path: PathBuf,
    /// `/`-separated path relative to the scan root.
    pub relative_path: String,
    pub title: String,
    pub topic: String,
    pub date: NaiveDate,
    /// Explicit tag from front matter, if any.
    pub jurisdiction: Option<String>,
    /// Text without the front-matter block.
    pub body: String,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub documents: Vec<LoadedDocument>,
    /// Filtered by extension, size, encoding or emptiness.
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

/// Walks `root` and loads every eligible text file.
///
/// Per-file problems are recorded in the result; only a missing root fails.
pub fn scan_dir(root: &Path, cfg: &IngestConfig) -> Result<ScanResult, IngestError> {
    if !root.is_dir() {
        return Err(IngestError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    let root = fs::canonicalize(root).map_err(|source| IngestError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let root = root.as_path();
    info!(root = %root.display(), "scan: start");

    let mut out = ScanResult::default();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep_entry);

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                warn!(%path, error = %err, "scan: walk error");
                out.failed.push((path, err.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !cfg.accepts_extension(ext) {
            debug!(path = %path.display(), "scan: skip (extension)");
            out.skipped += 1;
            continue;
        }

        match load_file(root, path, cfg) {
            Ok(Some(doc)) => out.documents.push(doc),
            Ok(None) => out.skipped += 1,
            Err(reason) => {
                warn!(path = %path.display(), %reason, "scan: load failed");
                out.failed.push((relative_path(root, path), reason));
            }
        }
    }

    info!(
        loaded = out.documents.len(),
        skipped = out.skipped,
        failed = out.failed.len(),
        "scan: done"
    );
    Ok(out)
}

fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() > 0 && entry.file_type().is_dir() {
        if let Some(name) = entry.file_name().to_str() {
            return !(name.starts_with('.') || matches!(name, "node_modules" | "target"));
        }
    }
    true
}

/// `Ok(None)` means the file is not usable text and should count as skipped.
fn load_file(root: &Path, path: &Path, cfg: &IngestConfig) -> Result<Option<LoadedDocument>, String> {
    let meta = fs::metadata(path).map_err(|e| e.to_string())?;
    if meta.len() > cfg.max_file_bytes {
        debug!(path = %path.display(), size = meta.len(), "scan: skip (too big)");
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let Ok(raw) = String::from_utf8(bytes) else {
        debug!(path = %path.display(), "scan: skip (not utf-8)");
        return Ok(None);
    };
    if raw.contains('\0') {
        debug!(path = %path.display(), "scan: skip (binary)");
        return Ok(None);
    }

    let (front, body) = split_front_matter(&raw);
    let body = body.trim();
    if body.is_empty() {
        debug!(path = %path.display(), "scan: skip (empty)");
        return Ok(None);
    }

    let title = front
        .get("title")
        .cloned()
        .unwrap_or_else(|| title_from_body(body, path));
    let topic = front.get("topic").cloned().unwrap_or_else(|| title.clone());
    let date = front
        .get("date")
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or_else(|| modified_date(meta.modified().ok()));
    let jurisdiction = front
        .get("jurisdiction")
        .or_else(|| front.get("category"))
        .map(|j| j.to_lowercase());

    Ok(Some(LoadedDocument {
        path: path.to_path_buf(),
        relative_path: relative_path(root, path),
        title,
        topic,
        date,
        jurisdiction,
        body: body.to_string(),
    }))
}

pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits a leading `---` block into lowercase keys and trimmed values.
pub(crate) fn split_front_matter(raw: &str) -> (std::collections::HashMap<String, String>, &str) {
    let mut map = std::collections::HashMap::new();
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (map, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim();
        if trimmed == "---" {
            return (map, &rest[offset..]);
        }
        if let Some((k, v)) = trimmed.split_once(':') {
            let v = v.trim().trim_matches('"').trim_matches('\'');
            if !v.is_empty() {
                map.insert(k.trim().to_ascii_lowercase(), v.to_string());
            }
        }
    }
    // Unterminated block: treat the whole file as body.
    (std::collections::HashMap::new(), text)
}

fn title_from_body(body: &str, path: &Path) -> String {
    let line = body
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.trim_start_matches('#').trim())
        .filter(|l| !l.is_empty());
    match line {
        Some(l) => l.chars().take(TITLE_MAX_CHARS).collect(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

fn modified_date(modified: Option<SystemTime>) -> NaiveDate {
    let ts: DateTime<Utc> = modified.map(DateTime::from).unwrap_or_else(Utc::now);
    ts.date_naive()
}
