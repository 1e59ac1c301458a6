//! Optional coarse categorization by the auxiliary model.

use std::fmt;

use rag_core::TextGenerator;
use serde::Serialize;
use tracing::{debug, warn};

const SAMPLE_CHARS: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Fiction,
    NonFiction,
    Technical,
    Uncategorized,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fiction => "fiction",
            Category::NonFiction => "non-fiction",
            Category::Technical => "technical",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// Exact category name after trimming and lowercasing; anything else is uncategorized.
    pub fn from_reply(reply: &str) -> Self {
        let word = reply
            .trim()
            .trim_matches(|c: char| c.is_ascii_punctuation() && c != '-')
            .to_lowercase();
        match word.as_str() {
            "fiction" => Category::Fiction,
            "non-fiction" | "nonfiction" => Category::NonFiction,
            "technical" => Category::Technical,
            _ => Category::Uncategorized,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asks the model for one of the fixed categories from a text sample.
///
/// Model failures degrade to [`Category::Uncategorized`].
pub async fn classify(generator: &dyn TextGenerator, text: &str) -> Category {
    let sample: String = text.chars().take(SAMPLE_CHARS).collect();
    let prompt = format!(
        "Classify this document into ONE of these categories:\n\
         - fiction: creative writing, stories, novels, narratives\n\
         - non-fiction: essays, articles, analysis, factual writing\n\
         - technical: code, documentation, specifications\n\n\
         Document excerpt:\n{sample}\n\n\
         Category (return ONLY the category name):"
    );
    match generator.complete(&prompt, None).await {
        Ok(reply) => {
            let cat = Category::from_reply(&reply);
            debug!(category = %cat, "classified");
            cat
        }
        Err(e) => {
            warn!(error = %e, "classification failed");
            Category::Uncategorized
        }
    }
}
