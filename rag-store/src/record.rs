//! Core data models used by the library.

use rag_core::{DocumentId, ScoredCandidate};
use serde_json::Value;
use tracing::warn;

/// One embedded chunk as stored in the vector index.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkRecord {
    pub doc_id: DocumentId,
    pub chunk_index: u32,
    pub text: String,
    pub source_path: String,
    pub vector: Vec<f32>,
}

impl ChunkRecord {
    pub fn to_candidate(&self, score: f32) -> ScoredCandidate {
        ScoredCandidate {
            doc_id: self.doc_id.clone(),
            chunk_index: self.chunk_index,
            text: self.text.clone(),
            source_path: self.source_path.clone(),
            score,
        }
    }
}

/// Rebuilds a candidate from a search payload; `None` when `doc_id` is absent.
pub fn candidate_from_payload(score: f32, payload: &Value) -> Option<ScoredCandidate> {
    let Some(doc_id) = payload.get("doc_id").and_then(Value::as_str) else {
        warn!("search hit without doc_id payload; skipped");
        return None;
    };
    Some(ScoredCandidate {
        doc_id: DocumentId::from_raw(doc_id),
        chunk_index: payload
            .get("chunk_index")
            .and_then(Value::as_i64)
            .and_then(|i| u32::try_from(i).ok())
            .unwrap_or(0),
        text: payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source_path: payload
            .get("source_path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_maps_to_candidate() {
        let p = json!({"doc_id": "abc", "chunk_index": 2, "text": "t", "source_path": "a.md"});
        let c = candidate_from_payload(0.5, &p).unwrap();
        assert_eq!(c.doc_id.as_str(), "abc");
        assert_eq!(c.chunk_index, 2);
        assert!(candidate_from_payload(0.5, &json!({"text": "x"})).is_none());
    }
}
