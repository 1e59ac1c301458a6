//! Prompt builder: short system message + compact context block.

use rag_core::ScoredCandidate;
use rag_core::text::safe_truncate;

/// Default system instructions for answers over personal documents.
pub const DEFAULT_SYSTEM: &str = r#"
You answer questions about the user's own documents. Be concise and cite the source file of each fact.
Use the provided context as ground truth; if it is insufficient, say so.
"#;

/// Answer returned when no document satisfied the metadata criteria.
pub const NO_MATCH_ANSWER: &str = "No documents found matching the strict metadata criteria.";

/// Builds the user prompt with a labeled context block of at most `max_chars`.
///
/// Candidates keep their rerank order; the block stops at the budget.
///
/// # Example
/// ```
/// # use contextor::prompt::build_user_prompt;
/// let prompt = build_user_prompt("How to X?", &[], 2000);
/// assert!(prompt.contains("Question:"));
/// ```
pub fn build_user_prompt(question: &str, context: &[ScoredCandidate], max_chars: usize) -> String {
    let mut out = String::new();
    out.push_str("Question:\n");
    out.push_str(question.trim());
    out.push_str("\n\n");

    if context.is_empty() {
        return out;
    }

    out.push_str("Context (most relevant first):\n");
    let mut budget = max_chars;
    for (i, c) in context.iter().enumerate() {
        let header = format!(
            "==[{}]== {} #{} (score {:.3})\n",
            i + 1,
            c.source_path,
            c.chunk_index,
            c.score
        );
        if header.len() >= budget {
            break;
        }
        out.push_str(&header);
        budget -= header.len();

        let text = c.text.trim();
        let take = budget.saturating_sub(2);
        if text.len() > take {
            out.push_str(safe_truncate(text, take));
            out.push_str("\n...\n");
            break;
        }
        out.push_str(text);
        out.push('\n');
        budget -= text.len() + 1;
    }
    out.push('\n');
    out.push_str("Answer using only the context above.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::DocumentId;

    fn cand(path: &str, text: &str) -> ScoredCandidate {
        ScoredCandidate {
            doc_id: DocumentId::from_canonical(path),
            chunk_index: 0,
            text: text.into(),
            source_path: path.into(),
            score: 0.5,
        }
    }

    #[test]
    fn context_respects_budget_and_order() {
        let ctx = vec![cand("first.md", &"a".repeat(100)), cand("second.md", &"b".repeat(500))];
        let p = build_user_prompt("q?", &ctx, 300);
        let first = p.find("first.md").unwrap();
        let second = p.find("second.md").unwrap();
        assert!(first < second);
        assert!(p.matches('b').count() < 300);
        assert!(p.contains("..."));
    }

    #[test]
    fn no_context_means_bare_question() {
        let p = build_user_prompt("  hi  ", &[], 100);
        assert_eq!(p, "Question:\nhi\n\n");
    }
}
