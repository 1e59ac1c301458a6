//! Text normalization and chunking for embeddings.

use tracing::debug;

/// Normalize document text with minimal layout disruption.
///
/// - Trims trailing whitespace on each line.
/// - Collapses runs of blank lines into one.
/// - Keeps newlines so paragraph boundaries survive chunking.
pub fn normalize_text_light(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0usize;

    for line in s.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

/// Splits text into windows of at most `max_chars` characters.
///
/// Consecutive windows share up to `overlap` characters (clamped to half a
/// window). A window prefers to end on whitespace in its second half.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let max = max_chars.max(1);
    let overlap = overlap.min(max / 2);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let hard_end = (start + max).min(chars.len());
        let mut end = hard_end;
        if hard_end < chars.len() {
            let floor = (start + max / 2).max(start + 1);
            if let Some(ws) = (floor..hard_end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    debug!(chars = chars.len(), chunks = out.len(), "chunk_text");
    out
}

/// Cuts `s` to at most `max` bytes on a char boundary.
pub fn safe_truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// Short single-line preview for logs and API payloads.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut p: String = flat.chars().take(max_chars).collect();
        p.push_str("...");
        p
    }
}
