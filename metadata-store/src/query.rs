//! Structured metadata criteria and their free-text parser.
//!
//! Recognized in free text:
//! - `jurisdiction:<tag>` or `category:<tag>`
//! - `after:<YYYY-MM-DD>` / `before:<YYYY-MM-DD>` (exclusive bounds)
//! - `cluster:<name>`
//! - `<N> most recent`, `<N> latest`, `latest <N>`: limit + newest-first order
//! - any other word of 3+ chars that is not a stopword becomes a topic term
//!
//! A document matches when ANY topic term is a case-insensitive substring of
//! its topic or equals its jurisdiction, and ALL structured criteria hold.

use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::schema::fold;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "and", "any", "are", "before", "can", "concerning", "did",
    "does", "doc", "docs", "document", "documents", "file", "files", "filed", "find", "for",
    "from", "get", "give", "had", "has", "have", "hello", "hey", "how", "into", "list",
    "most", "please", "regarding", "related", "say", "says", "select", "show", "some", "tell",
    "thank", "thanks", "that", "the", "their", "them", "there", "these", "this", "those",
    "what", "when", "where", "which", "who", "why", "with", "you", "your",
];

const RECENCY_WORDS: &[&str] = &["recent", "latest", "newest"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataQuery {
    pub topic_terms: Vec<String>,
    pub jurisdiction: Option<String>,
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
    pub cluster: Option<String>,
    /// Requested number of documents; the store still applies its own cap.
    pub limit: Option<usize>,
    pub newest_first: bool,
}

impl MetadataQuery {
    pub fn parse(text: &str) -> Self {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(clean_token)
            .filter(|t| !t.is_empty())
            .collect();

        let mut q = Self::default();
        let mut i = 0;
        while i < tokens.len() {
            let tok = tokens[i].as_str();

            if let Some((key, value)) = tok.split_once(':') {
                match key {
                    "jurisdiction" | "category" if !value.is_empty() => {
                        q.jurisdiction = Some(value.to_string())
                    }
                    "after" => q.after = parse_date(value),
                    "before" => q.before = parse_date(value),
                    "cluster" if !value.is_empty() => q.cluster = Some(value.to_string()),
                    _ => q.push_term(tok),
                }
                i += 1;
                continue;
            }

            if let Ok(n) = tok.parse::<usize>() {
                let next = tokens.get(i + 1).map(String::as_str);
                let next2 = tokens.get(i + 2).map(String::as_str);
                if is_recency(next) || (next == Some("most") && is_recency(next2)) {
                    q.limit = Some(n);
                    q.newest_first = true;
                }
                i += 1;
                continue;
            }

            if is_recency(Some(tok)) {
                q.newest_first = true;
                if let Some(n) = tokens.get(i + 1).and_then(|s| s.parse::<usize>().ok()) {
                    q.limit = Some(n);
                    i += 2;
                    continue;
                }
            }

            q.push_term(tok);
            i += 1;
        }
        q
    }

    /// Whether any filtering criterion is present.
    pub fn has_criteria(&self) -> bool {
        !self.topic_terms.is_empty()
            || self.jurisdiction.is_some()
            || self.after.is_some()
            || self.before.is_some()
            || self.cluster.is_some()
    }

    /// `min(requested limit, max_results)`.
    pub fn effective_cap(&self, max_results: usize) -> usize {
        self.limit.map_or(max_results, |l| l.min(max_results))
    }

    fn push_term(&mut self, tok: &str) {
        let keep = tok.chars().count() >= 3
            && !STOPWORDS.contains(&tok)
            && !RECENCY_WORDS.contains(&tok)
            && !tok.chars().all(|c| c.is_ascii_digit())
            && !self.topic_terms.iter().any(|t| t == tok);
        if keep {
            self.topic_terms.push(tok.to_string());
        }
    }

    /// SQL selecting at most `cap + 1` ids; the extra row only signals truncation.
    pub(crate) fn to_sql(&self, cap: usize) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "SELECT d.id FROM documents d LEFT JOIN clusters c ON d.cluster_id = c.id WHERE 1 = 1",
        );
        let mut params: Vec<Value> = Vec::new();

        if !self.topic_terms.is_empty() {
            let ors = self
                .topic_terms
                .iter()
                .map(|_| "(d.topic_key LIKE ? ESCAPE '\\' OR d.jurisdiction_key = ?)")
                .collect::<Vec<_>>()
                .join(" OR ");
            sql.push_str(&format!(" AND ({ors})"));
            for t in &self.topic_terms {
                let t = fold(t);
                params.push(Value::Text(format!("%{}%", escape_like(&t))));
                params.push(Value::Text(t));
            }
        }
        if let Some(j) = &self.jurisdiction {
            sql.push_str(" AND d.jurisdiction_key = ?");
            params.push(Value::Text(fold(j)));
        }
        if let Some(a) = self.after {
            sql.push_str(" AND d.date > ?");
            params.push(Value::Text(a.format("%Y-%m-%d").to_string()));
        }
        if let Some(b) = self.before {
            sql.push_str(" AND d.date < ?");
            params.push(Value::Text(b.format("%Y-%m-%d").to_string()));
        }
        if let Some(c) = &self.cluster {
            sql.push_str(" AND c.name_key = ?");
            params.push(Value::Text(fold(c)));
        }

        if self.newest_first {
            sql.push_str(" ORDER BY d.date DESC, d.id ASC");
        } else {
            sql.push_str(" ORDER BY d.id ASC");
        }
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(cap.saturating_add(1).min(i64::MAX as usize) as i64));

        (sql, params)
    }
}

fn is_recency(tok: Option<&str>) -> bool {
    tok.is_some_and(|t| RECENCY_WORDS.contains(&t))
}

fn clean_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | ':')))
        .to_lowercase()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            warn!(%value, error = %e, "ignoring malformed date criterion");
            None
        }
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recency_limit_and_terms() {
        let q = MetadataQuery::parse("Select the 100 most recent legal documents about asbestos.");
        assert_eq!(q.limit, Some(100));
        assert!(q.newest_first);
        assert_eq!(q.topic_terms, vec!["legal", "asbestos"]);
    }

    #[test]
    fn parses_structured_tokens() {
        let q = MetadataQuery::parse(
            "jurisdiction:US after:2020-01-01 before:2023-06-30, cluster:contract_law latest 5",
        );
        assert_eq!(q.jurisdiction.as_deref(), Some("us"));
        assert_eq!(q.after, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(q.before, NaiveDate::from_ymd_opt(2023, 6, 30));
        assert_eq!(q.cluster.as_deref(), Some("contract_law"));
        assert_eq!(q.limit, Some(5));
        assert!(q.topic_terms.is_empty());
        assert!(q.has_criteria());
    }

    #[test]
    fn malformed_date_is_ignored() {
        let q = MetadataQuery::parse("after:yesterday");
        assert!(q.after.is_none());
        assert!(!q.has_criteria());
    }

    #[test]
    fn small_talk_has_no_criteria() {
        assert!(!MetadataQuery::parse("hello, how are you?").has_criteria());
    }

    #[test]
    fn cap_is_min_of_limit_and_max() {
        let mut q = MetadataQuery::default();
        assert_eq!(q.effective_cap(100), 100);
        q.limit = Some(500);
        assert_eq!(q.effective_cap(100), 100);
        q.limit = Some(7);
        assert_eq!(q.effective_cap(100), 7);
    }

    #[test]
    fn sql_limits_to_cap_plus_one() {
        let q = MetadataQuery::parse("asbestos");
        let (sql, params) = q.to_sql(10);
        assert!(sql.ends_with("LIMIT ?"));
        assert_eq!(params.last(), Some(&Value::Integer(11)));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
