//! Filter construction for Qdrant.
//!
//! Every search is restricted with a `must` keyword IN-set on `doc_id`, so the
//! engine never scores a point outside the candidate set.

use qdrant_client::qdrant::{
    Condition, FieldCondition, Filter, Match, RepeatedStrings, condition::ConditionOneOf,
    r#match::MatchValue,
};
use rag_core::{CandidateIdSet, DocumentId};
use tracing::debug;

pub const DOC_ID_FIELD: &str = "doc_id";

/// `doc_id IN (set)`.
pub fn doc_ids_in(set: &CandidateIdSet) -> Filter {
    debug!(ids = set.len(), "filters::doc_ids_in");
    let strings = set.iter().map(|id| id.as_str().to_string()).collect();
    Filter {
        must: vec![keyword_condition(MatchValue::Keywords(RepeatedStrings { strings }))],
        ..Default::default()
    }
}

/// `doc_id == id`; used to drop a document's previous chunks.
pub fn doc_id_eq(id: &DocumentId) -> Filter {
    Filter {
        must: vec![keyword_condition(MatchValue::Keyword(id.as_str().to_string()))],
        ..Default::default()
    }
}

fn keyword_condition(value: MatchValue) -> Condition {
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: DOC_ID_FIELD.to_string(),
            r#match: Some(Match {
                match_value: Some(value),
            }),
            ..Default::default()
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_set_filter_lists_every_id_under_must() {
        let set = CandidateIdSet::from_ids(
            ["a", "b"].into_iter().map(DocumentId::from_raw),
            10,
        );
        let f = doc_ids_in(&set);
        assert!(f.should.is_empty());
        assert_eq!(f.must.len(), 1);
        let Some(ConditionOneOf::Field(fc)) = &f.must[0].condition_one_of else {
            panic!("expected field condition");
        };
        assert_eq!(fc.key, "doc_id");
        let Some(Match {
            match_value: Some(MatchValue::Keywords(RepeatedStrings { strings })),
        }) = &fc.r#match
        else {
            panic!("expected keywords match");
        };
        assert_eq!(strings, &vec!["a".to_string(), "b".to_string()]);
    }
}
