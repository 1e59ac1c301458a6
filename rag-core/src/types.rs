//! Domain records shared across the pipeline.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::DocumentId;

/// Metadata row for an ingested document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub topic: String,
    pub date: NaiveDate,
    /// Jurisdiction or category tag (`"personal"`, `"technical"`, ...).
    pub jurisdiction: String,
    pub source_path: String,
    pub cluster_id: Option<i64>,
}

/// A named group of documents from the latest clustering run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i64,
    pub name: String,
    pub member_count: usize,
}

/// Bounded set of document ids produced by structured filtering.
///
/// `cap` is the limit that was applied; `truncated` is set when more rows
/// matched than the cap allowed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CandidateIdSet {
    ids: BTreeSet<DocumentId>,
    cap: usize,
    truncated: bool,
}

impl CandidateIdSet {
    /// Builds a set from ids in priority order, keeping at most `cap` distinct ids.
    pub fn from_ids(ids: impl IntoIterator<Item = DocumentId>, cap: usize) -> Self {
        let mut set = BTreeSet::new();
        let mut truncated = false;
        for id in ids {
            if set.contains(&id) {
                continue;
            }
            if set.len() == cap {
                truncated = true;
                break;
            }
            set.insert(id);
        }
        Self {
            ids: set,
            cap,
            truncated,
        }
    }

    pub fn empty(cap: usize) -> Self {
        Self {
            ids: BTreeSet::new(),
            cap,
            truncated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentId> {
        self.ids.iter()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// One retrieved chunk with its current relevance score.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub doc_id: DocumentId,
    pub chunk_index: u32,
    pub text: String,
    pub source_path: String,
    pub score: f32,
}

/// Descending score, ties broken by `(doc_id, chunk_index)` ascending.
pub fn rank_cmp(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
        .then_with(|| a.chunk_index.cmp(&b.chunk_index))
}

pub fn sort_by_rank(items: &mut [ScoredCandidate]) {
    items.sort_by(rank_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> DocumentId {
        DocumentId::from_raw(s)
    }

    fn cand(doc: &str, chunk: u32, score: f32) -> ScoredCandidate {
        ScoredCandidate {
            doc_id: id(doc),
            chunk_index: chunk,
            text: String::new(),
            source_path: String::new(),
            score,
        }
    }

    #[test]
    fn from_ids_flags_truncation_only_when_more_exist() {
        let exact = CandidateIdSet::from_ids(["a", "b"].map(id), 2);
        assert_eq!(exact.len(), 2);
        assert!(!exact.is_truncated());

        let over = CandidateIdSet::from_ids(["a", "b", "c"].map(id), 2);
        assert_eq!(over.len(), 2);
        assert!(over.is_truncated());
        assert!(over.contains(&id("a")) && over.contains(&id("b")));
    }

    #[test]
    fn duplicates_do_not_count_against_cap() {
        let s = CandidateIdSet::from_ids(["a", "a", "b"].map(id), 2);
        assert_eq!(s.len(), 2);
        assert!(!s.is_truncated());
    }

    #[test]
    fn ties_break_on_doc_then_chunk() {
        let mut v = vec![cand("b", 0, 0.5), cand("a", 1, 0.5), cand("a", 0, 0.5), cand("z", 0, 0.9)];
        sort_by_rank(&mut v);
        let order: Vec<_> = v.iter().map(|c| (c.doc_id.as_str(), c.chunk_index)).collect();
        assert_eq!(order, vec![("z", 0), ("a", 0), ("a", 1), ("b", 0)]);
    }

    proptest! {
        #[test]
        fn never_exceeds_cap(ids in proptest::collection::vec("[a-f]{1,3}", 0..60), cap in 0usize..20) {
            let set = CandidateIdSet::from_ids(ids.iter().map(|s| id(s)), cap);
            prop_assert!(set.len() <= cap);
            prop_assert_eq!(set.cap(), cap);
        }
    }
}
